//! Location lifecycle: create, describe and delete by backend kind

use datamover_common::arn::Arn;
use datamover_common::defaults::{bucket_access_role_name, role_path};
use datamover_common::{
    LocationDescription, LocationInput, LocationType, MoverError, Result, S3LocationInput, Tags,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::Orchestrator;
use super::access_role::{delete_access_role, ensure_role};
use crate::aws::CreateS3LocationInput;
use crate::retry::retry;

/// A location created for a mover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProvisionedLocation {
    pub arn: String,
    pub kind: LocationType,
}

fn invalid_type(kind: impl std::fmt::Display) -> MoverError {
    MoverError::bad_request(format!("invalid location type {kind}"))
}

impl Orchestrator {
    /// Create one side of a mover.
    pub(crate) async fn create_location(
        &self,
        mover: &str,
        group: &str,
        input: &LocationInput,
        tags: &Tags,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedLocation> {
        let kind = input
            .location_type()
            .ok_or_else(|| invalid_type(&input.kind))?;

        match kind {
            LocationType::S3 => {
                let s3 = input
                    .s3
                    .as_ref()
                    .ok_or_else(|| MoverError::bad_request("S3 location details are required"))?;
                let arn = self
                    .create_s3_location(mover, group, s3, tags, cancel)
                    .await?;
                Ok(ProvisionedLocation { arn, kind })
            }
            LocationType::Efs | LocationType::Smb | LocationType::Nfs => {
                warn!(kind = %kind, "Only S3 locations can be created");
                Err(invalid_type(kind))
            }
        }
    }

    #[instrument(skip_all, fields(mover = %mover, bucket = %input.s3_bucket_arn))]
    async fn create_s3_location(
        &self,
        mover: &str,
        group: &str,
        input: &S3LocationInput,
        tags: &Tags,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let bucket = Arn::parse(&input.s3_bucket_arn)
            .map_err(|e| MoverError::bad_request(format!("invalid bucket ARN: {e}")))?;
        let role_name = bucket_access_role_name(mover, &bucket.resource);
        let role = ensure_role(
            self.roles.as_ref(),
            &role_path(&self.org, group),
            &role_name,
            &input.s3_bucket_arn,
            tags,
        )
        .await?;

        let request = CreateS3LocationInput {
            bucket_arn: input.s3_bucket_arn.clone(),
            bucket_access_role_arn: role.arn.clone(),
            storage_class: input.s3_storage_class.clone(),
            subdirectory: input.subdirectory.clone(),
            tags: tags.clone(),
        };

        // A new role can take a few seconds to become assumable.
        let created = retry(&self.retry, Some(cancel), "create S3 location", || {
            let request = request.clone();
            async move { self.transfer.create_location_s3(request).await }
        })
        .await;

        match created {
            Ok(arn) => {
                info!(location_arn = %arn, role = %role_name, "Created S3 location");
                Ok(arn)
            }
            Err(e) => {
                if role.created {
                    info!(role = %role_name, "Location creation failed, removing new role");
                    if let Err(cleanup) = delete_access_role(self.roles.as_ref(), &role.arn).await {
                        warn!(role = %role_name, error = %cleanup, "Failed to remove new role");
                    }
                }
                Err(e)
            }
        }
    }

    pub(crate) async fn describe_location(
        &self,
        kind: LocationType,
        location_arn: &str,
    ) -> Result<LocationDescription> {
        let description = match kind {
            LocationType::S3 => {
                LocationDescription::S3(self.transfer.describe_location_s3(location_arn).await?)
            }
            LocationType::Efs => {
                LocationDescription::Efs(self.transfer.describe_location_efs(location_arn).await?)
            }
            LocationType::Smb => {
                LocationDescription::Smb(self.transfer.describe_location_smb(location_arn).await?)
            }
            LocationType::Nfs => {
                LocationDescription::Nfs(self.transfer.describe_location_nfs(location_arn).await?)
            }
        };
        Ok(description)
    }

    /// Describe a location whose kind may be unknown; unknown means absent.
    pub(crate) async fn describe_location_if_known(
        &self,
        kind: Option<LocationType>,
        location_arn: &str,
    ) -> Result<Option<LocationDescription>> {
        match kind {
            Some(kind) if !location_arn.is_empty() => {
                self.describe_location(kind, location_arn).await.map(Some)
            }
            _ => {
                warn!(location_arn = %location_arn, "Location type unknown, skipping describe");
                Ok(None)
            }
        }
    }

    /// Delete a location and its bucket access role.
    pub(crate) async fn delete_location(
        &self,
        mover: &str,
        location_arn: &str,
        kind: LocationType,
    ) -> Result<()> {
        if mover.is_empty() || location_arn.is_empty() {
            return Err(MoverError::bad_request("invalid input"));
        }
        if !kind.is_provisionable() {
            return Err(invalid_type(kind));
        }

        let description = self.describe_location(kind, location_arn).await?;
        self.remove_location(mover, &description).await
    }

    /// Delete an already described location.
    pub(crate) async fn remove_location(
        &self,
        mover: &str,
        location: &LocationDescription,
    ) -> Result<()> {
        let kind = location.location_type();
        if !kind.is_provisionable() {
            return Err(invalid_type(kind));
        }

        let location_arn = location.location_arn();
        debug!(mover = %mover, location_arn = %location_arn, "Deleting location");
        self.transfer.delete_location(location_arn).await?;
        info!(mover = %mover, location_arn = %location_arn, "Deleted location");

        match location.access_role_arn() {
            Some(role_arn) => delete_access_role(self.roles.as_ref(), role_arn).await,
            None => {
                warn!(location_arn = %location_arn, "Location has no bucket access role");
                Ok(())
            }
        }
    }
}
