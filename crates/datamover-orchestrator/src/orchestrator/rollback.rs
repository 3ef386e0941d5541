//! Compensating actions for partially provisioned movers
//!
//! Each successfully created resource registers an action that undoes it.
//! On failure the actions run in reverse registration order; a failing
//! action is logged and the rest still run.

use datamover_common::{MoverError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{info, warn};

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct RollbackAction {
    description: String,
    action: Action,
}

/// Outcome of running a rollback.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub succeeded: usize,
    /// (description, error) for every action that failed
    pub failed: Vec<(String, MoverError)>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// LIFO list of compensating actions.
#[derive(Default)]
pub struct Rollback {
    actions: Vec<RollbackAction>,
}

impl std::fmt::Debug for Rollback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollback")
            .field(
                "actions",
                &self.actions.iter().map(|a| &a.description).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Rollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to undo the step that just succeeded.
    pub fn push<F, Fut>(&mut self, description: impl Into<String>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.actions.push(RollbackAction {
            description: description.into(),
            action: Box::new(move || f().boxed()),
        });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action, most recent first. Each runs at most once.
    pub async fn execute(self) -> RollbackReport {
        let mut report = RollbackReport::default();

        for RollbackAction {
            description,
            action,
        } in self.actions.into_iter().rev()
        {
            info!(step = %description, "Rolling back");
            match action().await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!(step = %description, error = %e, "Rollback step failed, continuing");
                    report.failed.push((description, e));
                }
            }
        }

        if report.is_clean() {
            info!(steps = report.succeeded, "Rollback complete");
        } else {
            warn!(
                succeeded = report.succeeded,
                failed = report.failed.len(),
                "Rollback finished with failures"
            );
        }
        report
    }
}
