//! Async task tracking
//!
//! A create runs in the background while its caller polls the task store.
//! The task is recorded before tracking begins; the worker then reports
//! through a [`ProgressReporter`] and a control loop drains the reporter's
//! channels into the store. Dropping the reporter without an error marks the
//! task complete. Store failures are logged and never reach the worker.

use datamover_common::MoverError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::store::TaskStore;

/// Worker-side handle for a tracked task.
#[derive(Debug)]
pub struct ProgressReporter {
    task_id: String,
    progress: mpsc::Sender<String>,
    errors: mpsc::Sender<MoverError>,
}

impl ProgressReporter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Send a progress message. Waits until the control loop accepts it.
    pub async fn progress(&self, message: impl Into<String>) {
        if self.progress.send(message.into()).await.is_err() {
            debug!(task_id = %self.task_id, "Tracker gone, progress dropped");
        }
    }

    /// Report the terminal failure and close the reporter.
    pub async fn fail(self, err: MoverError) {
        if self.errors.send(err).await.is_err() {
            warn!(task_id = %self.task_id, "Tracker gone, failure dropped");
        }
    }
}

/// Start tracking the recorded task `task_id` on `tasks`, returning the
/// worker's reporter.
pub fn spawn_tracker(
    store: Arc<dyn TaskStore>,
    task_id: String,
    tasks: &TaskTracker,
) -> ProgressReporter {
    let (progress_tx, progress_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = mpsc::channel(1);

    tasks.spawn(control_loop(store, task_id.clone(), progress_rx, error_rx));

    ProgressReporter {
        task_id,
        progress: progress_tx,
        errors: error_tx,
    }
}

async fn control_loop(
    store: Arc<dyn TaskStore>,
    task_id: String,
    mut progress: mpsc::Receiver<String>,
    mut errors: mpsc::Receiver<MoverError>,
) {
    let id = task_id.as_str();
    if let Err(e) = store.start(id).await {
        error!(task_id = %id, error = ?e, "Failed to record task start");
    }

    loop {
        tokio::select! {
            biased;

            Some(err) = errors.recv() => {
                while let Ok(message) = progress.try_recv() {
                    record(store.as_ref(), id, &message).await;
                }
                fail(store.as_ref(), id, &err).await;
                return;
            }

            message = progress.recv() => match message {
                Some(message) => record(store.as_ref(), id, &message).await,
                None => {
                    // The error may have been queued just before the reporter dropped.
                    if let Ok(err) = errors.try_recv() {
                        fail(store.as_ref(), id, &err).await;
                        return;
                    }
                    debug!(task_id = %id, "Task complete");
                    if let Err(e) = store.complete(id).await {
                        error!(task_id = %id, error = ?e, "Failed to complete task");
                    }
                    return;
                }
            },
        }
    }
}

async fn record(store: &dyn TaskStore, id: &str, message: &str) {
    info!(task_id = %id, "{message}");
    if let Err(e) = store.check_in(id).await {
        warn!(task_id = %id, error = ?e, "Failed to check in task");
    }
    if let Err(e) = store.log(id, message).await {
        warn!(task_id = %id, error = ?e, "Failed to log task progress");
    }
}

async fn fail(store: &dyn TaskStore, id: &str, err: &MoverError) {
    error!(task_id = %id, error = %err, "Task failed");
    if let Err(e) = store.fail(id, &err.to_string()).await {
        error!(task_id = %id, error = ?e, "Failed to record task failure");
    }
}
