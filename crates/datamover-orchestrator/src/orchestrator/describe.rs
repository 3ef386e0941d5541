use datamover_common::{MoverDescription, Result};
use tracing::{instrument, warn};

use super::Orchestrator;

impl Orchestrator {
    /// Task, both locations and tags of the mover `name` in `group`.
    #[instrument(skip_all, fields(org = %self.org, group = %group, mover = %name))]
    pub async fn describe(&self, group: &str, name: &str) -> Result<MoverDescription> {
        let (task, tags) = self.task_details_from_name(group, name).await?;
        let kinds = self.transfer.list_locations().await?;

        let kind_of = |arn: &str| {
            let kind = kinds.get(arn).copied();
            if kind.is_none() {
                warn!(location_arn = %arn, "Location missing from location index");
            }
            kind
        };
        let source_kind = kind_of(&task.source_location_arn);
        let destination_kind = kind_of(&task.destination_location_arn);

        let (source, destination) = tokio::try_join!(
            self.describe_location_if_known(source_kind, &task.source_location_arn),
            self.describe_location_if_known(destination_kind, &task.destination_location_arn),
        )?;

        Ok(MoverDescription {
            task,
            source,
            destination,
            tags,
        })
    }
}
