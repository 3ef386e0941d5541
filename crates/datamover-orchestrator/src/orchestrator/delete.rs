use datamover_common::{LocationDescription, MoverError, Result};
use tracing::{info, instrument};

use super::Orchestrator;

fn required<'a>(
    location: &'a Option<LocationDescription>,
    side: &str,
) -> Result<&'a LocationDescription> {
    location.as_ref().ok_or_else(|| {
        MoverError::bad_request(format!("unable to determine {side} location type"))
    })
}

impl Orchestrator {
    /// Delete the mover `name` in `group`: its task, then both locations and
    /// their bucket access roles.
    #[instrument(skip_all, fields(org = %self.org, group = %group, mover = %name))]
    pub async fn delete(&self, group: &str, name: &str) -> Result<()> {
        info!("Deleting data mover");
        let mover = self.describe(group, name).await?;

        self.transfer.delete_task(&mover.task.task_arn).await?;
        info!(task_arn = %mover.task.task_arn, "Deleted transfer task");

        self.remove_location(name, required(&mover.source, "source")?)
            .await?;
        self.remove_location(name, required(&mover.destination, "destination")?)
            .await?;

        info!("Deleted data mover");
        Ok(())
    }
}
