//! Asynchronous mover creation
//!
//! `create` validates the request, records an async task in the `created`
//! state and returns it immediately. The provisioning sequence then runs in the background:
//!
//! 1. source location (with its bucket access role)
//! 2. destination location (with its bucket access role)
//! 3. transfer task
//!
//! Each completed step registers a compensating action. If a later step
//! fails, or the orchestrator shuts down, the actions run most recent first
//! and the task is marked failed.

use datamover_common::arn::task_moniker;
use datamover_common::{LocationInput, MoverCreateRequest, MoverError, Result, Tags};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, instrument};

use super::Orchestrator;
use super::location::ProvisionedLocation;
use super::rollback::Rollback;
use super::tracker::{ProgressReporter, spawn_tracker};
use crate::aws::CreateTaskInput;
use crate::store::AsyncTask;

const SHUTDOWN_REASON: &str = "process shutting down";

/// A validated create request.
#[derive(Debug, Clone)]
struct CreatePlan {
    name: String,
    group: String,
    source: LocationInput,
    destination: LocationInput,
    tags: Tags,
}

impl Orchestrator {
    /// Start creating a mover in `group`. Returns the task to poll.
    ///
    /// Invalid input is rejected before anything is provisioned.
    #[instrument(skip_all, fields(org = %self.org, group = %group))]
    pub async fn create(&self, group: &str, request: MoverCreateRequest) -> Result<AsyncTask> {
        if group.is_empty() {
            return Err(MoverError::bad_request("group is required"));
        }
        let name = request.validate()?.to_string();
        let (Some(source), Some(destination)) = (request.source, request.destination) else {
            return Err(MoverError::bad_request("Source and Destination are required"));
        };

        let plan = CreatePlan {
            tags: request.tags.normalize(&self.org, group),
            name,
            group: group.to_string(),
            source,
            destination,
        };
        info!(
            mover = %plan.name,
            source = %plan.source.kind,
            destination = %plan.destination.kind,
            "Creating data mover"
        );

        // Visible to pollers before any provisioning starts.
        let task = AsyncTask::new();
        if let Err(e) = self.store.create(&task).await {
            error!(task_id = %task.id, error = ?e, "Failed to record task");
        }
        let reporter = spawn_tracker(self.store.clone(), task.id.clone(), &self.background);
        let cancel = self.shutdown.child_token();
        let span = info_span!("create_mover", task_id = %task.id, mover = %plan.name);

        let this = self.clone();
        self.background.spawn(
            async move { this.provision(plan, reporter, cancel).await }.instrument(span),
        );

        Ok(task)
    }

    async fn provision(
        &self,
        plan: CreatePlan,
        reporter: ProgressReporter,
        cancel: CancellationToken,
    ) {
        let mut rollback = Rollback::new();

        match self.provision_steps(&plan, &reporter, &cancel, &mut rollback).await {
            Ok(moniker) => {
                reporter
                    .progress(format!("created data mover '{}': {moniker}", plan.name))
                    .await;
            }
            Err(e) => {
                let e = if cancel.is_cancelled() && !e.message().starts_with(SHUTDOWN_REASON) {
                    MoverError::internal(format!("{SHUTDOWN_REASON}: {e}"))
                } else {
                    e
                };
                error!(error = %e, "Failed to create data mover");
                if !rollback.is_empty() {
                    reporter
                        .progress(format!("rolling back {} provisioning steps", rollback.len()))
                        .await;
                    let report = rollback.execute().await;
                    if !report.is_clean() {
                        error!(
                            failed = report.failed.len(),
                            "Rollback left resources behind"
                        );
                    }
                }
                reporter.fail(e).await;
            }
        }
    }

    async fn provision_steps(
        &self,
        plan: &CreatePlan,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
        rollback: &mut Rollback,
    ) -> Result<String> {
        check_cancelled(cancel)?;
        reporter.progress("requested creation of source location").await;
        let source = self
            .create_location(&plan.name, &plan.group, &plan.source, &plan.tags, cancel)
            .await
            .map_err(|e| e.context("failed to create source location"))?;
        self.register_location_rollback(rollback, &plan.name, "source", &source);

        check_cancelled(cancel)?;
        reporter
            .progress("requested creation of destination location")
            .await;
        let destination = self
            .create_location(
                &plan.name,
                &plan.group,
                &plan.destination,
                &plan.tags,
                cancel,
            )
            .await
            .map_err(|e| e.context("failed to create destination location"))?;
        self.register_location_rollback(rollback, &plan.name, "destination", &destination);

        check_cancelled(cancel)?;
        reporter
            .progress(format!("requested creation of datasync task {}", plan.name))
            .await;
        let task_arn = self
            .transfer
            .create_task(CreateTaskInput {
                name: plan.name.clone(),
                source_location_arn: source.arn,
                destination_location_arn: destination.arn,
                tags: plan.tags.clone(),
            })
            .await
            .map_err(|e| e.context("failed to create datasync task"))?;

        let transfer = self.transfer.clone();
        let arn = task_arn.clone();
        rollback.push(format!("deleting datasync task {task_arn}"), move || async move {
            transfer.delete_task(&arn).await
        });

        task_moniker(&task_arn)
            .map_err(|e| MoverError::internal(format!("failed to parse datasync task id: {e}")))
    }

    fn register_location_rollback(
        &self,
        rollback: &mut Rollback,
        mover: &str,
        side: &str,
        location: &ProvisionedLocation,
    ) {
        let this = self.clone();
        let mover = mover.to_string();
        let location = location.clone();
        rollback.push(format!("deleting {side} location"), move || async move {
            this.delete_location(&mover, &location.arn, location.kind)
                .await
        });
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(MoverError::internal(SHUTDOWN_REASON))
    } else {
        Ok(())
    }
}
