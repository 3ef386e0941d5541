//! Tag-based mover discovery
//!
//! The transfer service has no notion of groups, so movers are found through
//! the resource tag index and matched on their task name.

use datamover_common::arn::{Arn, is_task_arn};
use datamover_common::tags::identity_filters;
use datamover_common::{MoverError, Result, Tags, TransferTask};
use tracing::{debug, instrument, warn};

use super::Orchestrator;

/// Every transfer-service resource.
const ANY_RESOURCE: &str = "datasync";

/// Transfer tasks only.
const TASK_RESOURCE: &str = "datasync:task";

impl Orchestrator {
    /// Names of the movers in `group`, or in the whole org when `group` is empty.
    #[instrument(skip_all, fields(org = %self.org, group = %group))]
    pub async fn list(&self, group: &str) -> Result<Vec<String>> {
        let filters = identity_filters(&self.org, Some(group));
        let resources = self.tags.get_resources(&[ANY_RESOURCE], &filters).await?;
        debug!(count = resources.len(), "Tagged resources found");

        let mut names = Vec::new();
        for resource in resources {
            let arn = Arn::parse(&resource.arn).map_err(|e| {
                MoverError::internal(format!("failed to parse resource ARN: {e}"))
            })?;
            if !is_task_arn(&arn) {
                continue;
            }
            names.push(self.name_from_arn(&resource.arn).await?);
        }
        Ok(names)
    }

    /// The task name behind `task_arn`.
    pub(crate) async fn name_from_arn(&self, task_arn: &str) -> Result<String> {
        self.transfer
            .describe_task(task_arn)
            .await?
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MoverError::internal(format!("task {task_arn} has no name")))
    }

    /// Find the task named `name` in `group`, with its tags.
    pub(crate) async fn task_details_from_name(
        &self,
        group: &str,
        name: &str,
    ) -> Result<(TransferTask, Tags)> {
        if group.is_empty() || name.is_empty() {
            return Err(MoverError::bad_request("invalid input"));
        }

        let filters = identity_filters(&self.org, Some(group));
        let resources = self.tags.get_resources(&[TASK_RESOURCE], &filters).await?;
        if resources.is_empty() {
            return Err(MoverError::not_found("datasync mover not found"));
        }

        for resource in resources {
            if !(resource.tags.in_org(&self.org) && resource.tags.in_group(group)) {
                warn!(arn = %resource.arn, "Tag index returned a resource outside the group");
                continue;
            }
            let task = self.transfer.describe_task(&resource.arn).await?;
            if task.name.as_deref() == Some(name) {
                return Ok((task, resource.tags));
            }
        }

        Err(MoverError::not_found("datasync mover not found"))
    }
}
