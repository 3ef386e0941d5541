//! Run history and run control

use datamover_common::arn::{execution_arn, execution_id};
use datamover_common::{MoverError, MoverRun, Result, TransferTaskStatus};
use tracing::{info, instrument};

use super::Orchestrator;

impl Orchestrator {
    /// Execution ids of every run of the mover, as the service orders them.
    #[instrument(skip_all, fields(group = %group, mover = %name))]
    pub async fn run_list(&self, group: &str, name: &str) -> Result<Vec<String>> {
        let (task, _) = self.task_details_from_name(group, name).await?;
        let executions = self.transfer.list_task_executions(&task.task_arn).await?;
        Ok(executions
            .iter()
            .map(|arn| execution_id(arn).to_string())
            .collect())
    }

    /// Details of one run.
    #[instrument(skip_all, fields(group = %group, mover = %name, run_id = %run_id))]
    pub async fn run_describe(&self, group: &str, name: &str, run_id: &str) -> Result<MoverRun> {
        if run_id.is_empty() {
            return Err(MoverError::bad_request("invalid input"));
        }
        let (task, _) = self.task_details_from_name(group, name).await?;
        self.transfer
            .describe_task_execution(&execution_arn(&task.task_arn, run_id))
            .await
    }

    /// Start a run, returning its execution id.
    #[instrument(skip_all, fields(group = %group, mover = %name))]
    pub async fn start_run(&self, group: &str, name: &str) -> Result<String> {
        let (task, _) = self.task_details_from_name(group, name).await?;
        if task.status == TransferTaskStatus::Running {
            return Err(MoverError::conflict(format!(
                "data mover {name} is already running"
            )));
        }

        let execution = self.transfer.start_task_execution(&task.task_arn).await?;
        let id = execution_id(&execution).to_string();
        info!(run_id = %id, "Started run");
        Ok(id)
    }

    /// Cancel the current run.
    #[instrument(skip_all, fields(group = %group, mover = %name))]
    pub async fn stop_run(&self, group: &str, name: &str) -> Result<()> {
        let (task, _) = self.task_details_from_name(group, name).await?;
        let current = match (task.status, task.current_task_execution_arn) {
            (TransferTaskStatus::Running, Some(current)) => current,
            _ => {
                return Err(MoverError::conflict(format!(
                    "data mover {name} is not running"
                )));
            }
        };

        self.transfer.cancel_task_execution(&current).await?;
        info!(run_id = %execution_id(&current), "Stopped run");
        Ok(())
    }
}
