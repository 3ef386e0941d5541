//! Data mover orchestration
//!
//! An [`Orchestrator`] owns the cloud collaborators for one organization and
//! exposes the mover lifecycle: create (asynchronous, tracked through the
//! task store), delete, describe, list, and run control. Creates that fail
//! part way through are rolled back in reverse order.

pub mod access_role;
mod create;
mod delete;
mod describe;
mod index;
mod location;
pub mod rollback;
mod runs;
pub mod tracker;

pub use access_role::{EnsuredRole, delete_access_role, ensure_role};
pub use rollback::{Rollback, RollbackReport};
pub use tracker::{ProgressReporter, spawn_tracker};

use datamover_common::{MoverError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::aws::{
    AwsContext, DataSyncClient, IamClient, MemoryCloud, RoleStore, SessionParams, TagIndex,
    TaggingClient, TransferService,
};
use crate::retry::RetryPolicy;
use crate::store::{AsyncTask, TaskStore};

/// The cloud collaborators an orchestrator drives.
#[derive(Clone)]
pub struct Backends {
    pub transfer: Arc<dyn TransferService>,
    pub roles: Arc<dyn RoleStore>,
    pub tags: Arc<dyn TagIndex>,
}

impl Backends {
    /// Real AWS clients built from `ctx`.
    pub fn aws(ctx: &AwsContext) -> Self {
        Self {
            transfer: Arc::new(DataSyncClient::from_context(ctx)),
            roles: Arc::new(IamClient::from_context(ctx)),
            tags: Arc::new(TaggingClient::from_context(ctx)),
        }
    }

    /// Every collaborator served by one in-memory cloud.
    pub fn memory(cloud: Arc<MemoryCloud>) -> Self {
        Self {
            transfer: cloud.clone(),
            roles: cloud.clone(),
            tags: cloud,
        }
    }
}

/// Orchestrates data movers for one organization.
///
/// Cheap to clone; clones share collaborators, the shutdown token and the
/// set of background tasks.
#[derive(Clone)]
pub struct Orchestrator {
    org: String,
    transfer: Arc<dyn TransferService>,
    roles: Arc<dyn RoleStore>,
    tags: Arc<dyn TagIndex>,
    store: Arc<dyn TaskStore>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
    background: TaskTracker,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("org", &self.org)
            .field("retry", &self.retry)
            .field("background", &self.background.len())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(org: impl Into<String>, backends: Backends, store: Arc<dyn TaskStore>) -> Self {
        Self {
            org: org.into(),
            transfer: backends.transfer,
            roles: backends.roles,
            tags: backends.tags,
            store,
            retry: RetryPolicy::default(),
            shutdown: CancellationToken::new(),
            background: TaskTracker::new(),
        }
    }

    /// Build against AWS, optionally on a scoped session in the target account.
    pub async fn connect(
        ctx: &AwsContext,
        session: Option<&SessionParams>,
        org: impl Into<String>,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self> {
        let backends = match session {
            Some(params) => {
                let scoped = ctx.assume_role(params).await?;
                info!(role_arn = %params.role_arn, "Using assumed session");
                Backends::aws(&scoped)
            }
            None => Backends::aws(ctx),
        };
        Ok(Self::new(org, backends, store))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cancel background work when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Current state of an async task.
    pub async fn task_status(&self, id: &str) -> Result<AsyncTask> {
        self.store
            .get(id)
            .await
            .map_err(|e| MoverError::internal(format!("failed to read task {id}: {e:#}")))?
            .ok_or_else(|| MoverError::not_found(format!("task {id} not found")))
    }

    /// Wait until every background create and its tracker have finished.
    pub async fn wait_for_background(&self) {
        debug!(pending = self.background.len(), "Waiting for background tasks");
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Cancel in-flight creates, let them roll back, and wait for them.
    pub async fn shutdown(&self) {
        info!(pending = self.background.len(), "Shutting down orchestrator");
        self.shutdown.cancel();
        self.wait_for_background().await;
    }
}
