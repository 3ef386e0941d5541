//! Per-operation session permission sets
//!
//! Each orchestrator is built on a session assumed in the target account
//! with the least privilege the operation needs.

use datamover_common::defaults::managed_policy;
use datamover_common::policy::{mover_create_policy, mover_delete_policy};
use datamover_common::{MoverError, PolicyDocument, Result};

use super::account::AccountId;

/// Session name recorded in CloudTrail for assumed roles.
pub const SESSION_NAME: &str = "datamover";

/// The operation a session is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Operation {
    /// Create movers, including bucket access roles
    Create,
    /// Delete movers and their roles
    Delete,
    /// Describe, list and run history
    Read,
    /// Start and stop runs
    Run,
}

/// Parameters for assuming a role in a target account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub role_arn: String,
    pub session_name: String,
    pub external_id: Option<String>,
    pub inline_policy: Option<String>,
    pub policy_arns: Vec<String>,
}

/// Managed policies and inline policy granted to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionSet {
    pub policy_arns: Vec<&'static str>,
    pub inline_policy: Option<PolicyDocument>,
}

impl PermissionSet {
    /// The least privilege `operation` needs for movers owned by `org`.
    pub fn for_operation(operation: Operation, org: &str) -> Self {
        let (policy_arns, inline_policy) = match operation {
            Operation::Create => (
                vec![managed_policy::DATASYNC_FULL_ACCESS],
                Some(mover_create_policy(org)),
            ),
            Operation::Delete => (
                vec![
                    managed_policy::DATASYNC_FULL_ACCESS,
                    managed_policy::TAG_EDITOR_READ_ONLY,
                ],
                Some(mover_delete_policy(org)),
            ),
            Operation::Read => (
                vec![
                    managed_policy::DATASYNC_READ_ONLY,
                    managed_policy::TAG_EDITOR_READ_ONLY,
                ],
                None,
            ),
            Operation::Run => (
                vec![
                    managed_policy::DATASYNC_FULL_ACCESS,
                    managed_policy::TAG_EDITOR_READ_ONLY,
                ],
                None,
            ),
        };
        Self {
            policy_arns,
            inline_policy,
        }
    }
}

impl SessionParams {
    /// Build the permission set for `operation` in `account`.
    pub fn for_operation(
        operation: Operation,
        account: &AccountId,
        role_name: &str,
        external_id: Option<&str>,
        org: &str,
    ) -> Result<Self> {
        let permissions = PermissionSet::for_operation(operation, org);
        let inline_policy = permissions
            .inline_policy
            .map(|p| p.to_json())
            .transpose()
            .map_err(|e| MoverError::internal(format!("failed to generate policy: {e}")))?;

        Ok(Self {
            role_arn: account.role_arn(role_name),
            session_name: SESSION_NAME.to_string(),
            external_id: external_id.map(str::to_string),
            inline_policy,
            policy_arns: permissions
                .policy_arns
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}
