//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and
//! creating service clients from it, either with the ambient credentials or
//! with a scoped session assumed in a target account.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sts::types::PolicyDescriptorType;
use datamover_common::{MoverError, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

use super::error::SdkResultExt;
use super::session::SessionParams;

/// Name recorded as the source of assumed-role credentials.
const CREDENTIALS_PROVIDER_NAME: &str = "datamover-assumed-role";

/// Shared AWS configuration context for creating service clients.
///
/// # Example
/// ```ignore
/// let aws = AwsContext::new("us-east-1", None).await;
/// let scoped = aws.assume_role(&params).await?;
///
/// let datasync = DataSyncClient::from_context(&scoped);
/// let iam = IamClient::from_context(&scoped);
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    ///
    /// Credentials come from the environment, config files or an instance
    /// role; `profile` selects a named profile.
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the region string.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn datasync_client(&self) -> aws_sdk_datasync::Client {
        aws_sdk_datasync::Client::new(self.sdk_config())
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }

    pub fn tagging_client(&self) -> aws_sdk_resourcegroupstagging::Client {
        aws_sdk_resourcegroupstagging::Client::new(self.sdk_config())
    }

    /// Assume a role with a scoped permission set.
    ///
    /// Returns a new context whose clients carry the session credentials.
    pub async fn assume_role(&self, params: &SessionParams) -> Result<Self> {
        debug!(role_arn = %params.role_arn, policies = ?params.policy_arns, "Assuming role");

        let mut request = self
            .sts_client()
            .assume_role()
            .role_arn(&params.role_arn)
            .role_session_name(&params.session_name);
        if let Some(external_id) = &params.external_id {
            request = request.external_id(external_id);
        }
        if let Some(policy) = &params.inline_policy {
            request = request.policy(policy);
        }
        for arn in &params.policy_arns {
            request = request.policy_arns(PolicyDescriptorType::builder().arn(arn).build());
        }

        let output = request
            .send()
            .await
            .classify(|| format!("failed to assume role {}", params.role_arn))?;

        let creds = output.credentials().ok_or_else(|| {
            MoverError::internal(format!(
                "no credentials returned assuming {}",
                params.role_arn
            ))
        })?;
        let expiry = SystemTime::try_from(*creds.expiration()).ok();

        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            expiry,
            CREDENTIALS_PROVIDER_NAME,
        );

        let config = self
            .config
            .to_builder()
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build();

        info!(role_arn = %params.role_arn, "Assumed role");

        Ok(Self {
            config: Arc::new(config),
            region: self.region.clone(),
        })
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_context_creation() {
        let ctx = AwsContext::new("us-east-1", None).await;
        assert_eq!(ctx.region(), "us-east-1");
    }
}
