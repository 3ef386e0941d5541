//! Configuration types for the orchestrator

use datamover_common::Result;
use datamover_common::defaults::{
    DEFAULT_LOCATION_RETRY_ATTEMPTS, DEFAULT_LOCATION_RETRY_DELAY_SECS, DEFAULT_REGION,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::aws::{AccountId, Operation, SessionParams};
use crate::retry::RetryPolicy;

/// Which cloud the orchestrator talks to
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    #[default]
    Aws,
    /// Process-local fake, for dry runs
    Memory,
}

/// AWS connection settings
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            aws_profile: None,
        }
    }
}

/// Cross-account session settings
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Role assumed in each target account; ambient credentials when unset
    pub role_name: Option<String>,
    pub external_id: Option<String>,
}

impl SessionConfig {
    /// Session parameters for `operation` in `account`, if a session role is configured.
    pub fn params(
        &self,
        operation: Operation,
        account: &AccountId,
        org: &str,
    ) -> Result<Option<SessionParams>> {
        self.role_name
            .as_deref()
            .map(|role| {
                SessionParams::for_operation(
                    operation,
                    account,
                    role,
                    self.external_id.as_deref(),
                    org,
                )
            })
            .transpose()
    }
}

/// Location creation retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: usize,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOCATION_RETRY_ATTEMPTS,
            delay_secs: DEFAULT_LOCATION_RETRY_DELAY_SECS,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts.max(1),
            Duration::ZERO,
            Duration::from_secs(self.delay_secs),
        )
    }
}

/// Async task store settings
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// SQLite database path; the platform data dir when unset
    pub state_db: Option<PathBuf>,
}

impl StoreConfig {
    pub fn db_path(&self) -> anyhow::Result<PathBuf> {
        match &self.state_db {
            Some(path) => Ok(path.clone()),
            None => crate::store::default_db_path(),
        }
    }
}

/// Configuration for an orchestrator invocation
///
/// Composed of focused sub-configs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Owning organization of every mover
    pub org: String,
    pub backend: Backend,
    pub aws: AwsConfig,
    pub session: SessionConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

impl OrchestratorConfig {
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            backend: Backend::default(),
            aws: AwsConfig::default(),
            session: SessionConfig::default(),
            retry: RetryConfig::default(),
            store: StoreConfig::default(),
        }
    }

    pub fn region(&self) -> &str {
        &self.aws.region
    }

    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }
}
