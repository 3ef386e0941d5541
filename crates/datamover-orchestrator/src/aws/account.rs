//! AWS account identity

use datamover_common::MoverError;

/// Strongly-typed AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Validate a caller-supplied account id.
    pub fn parse(s: &str) -> Result<Self, MoverError> {
        if s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(MoverError::bad_request(format!(
                "invalid account id '{s}', expected 12 digits"
            )))
        }
    }

    /// ARN of a role in this account.
    pub fn role_arn(&self, role_name: &str) -> String {
        format!("arn:aws:iam::{}:role/{role_name}", self.0)
    }
}
