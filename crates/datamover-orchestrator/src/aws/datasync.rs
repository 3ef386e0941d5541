//! DataSync location, task and execution operations

use async_trait::async_trait;
use aws_sdk_datasync::Client;
use aws_sdk_datasync::primitives::DateTime as SmithyDateTime;
use aws_sdk_datasync::types::{
    Options, PreserveDeletedFiles, S3Config, S3StorageClass, TagListEntry, TransferMode,
    VerifyMode,
};
use chrono::{DateTime, Utc};
use datamover_common::defaults::{
    TASK_PRESERVE_DELETED_FILES, TASK_TRANSFER_MODE, TASK_VERIFY_MODE,
};
use datamover_common::location::LocationType;
use datamover_common::model::{
    EfsLocationDetails, MoverRun, NfsLocationDetails, RunResult, S3LocationDetails,
    SmbLocationDetails,
};
use datamover_common::{MoverError, Result, Tags, TransferTask, TransferTaskStatus};
use std::collections::HashMap;
use tracing::debug;

use super::context::AwsContext;
use super::error::SdkResultExt;

/// Input for creating an S3 location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateS3LocationInput {
    pub bucket_arn: String,
    pub bucket_access_role_arn: String,
    pub storage_class: Option<String>,
    pub subdirectory: Option<String>,
    pub tags: Tags,
}

/// Input for creating a transfer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskInput {
    pub name: String,
    pub source_location_arn: String,
    pub destination_location_arn: String,
    pub tags: Tags,
}

/// Location and task operations the orchestrator depends on.
#[async_trait]
pub trait TransferService: Send + Sync {
    /// Create an S3 location, returning its ARN.
    async fn create_location_s3(&self, input: CreateS3LocationInput) -> Result<String>;

    async fn delete_location(&self, location_arn: &str) -> Result<()>;

    async fn describe_location_s3(&self, location_arn: &str) -> Result<S3LocationDetails>;

    async fn describe_location_efs(&self, location_arn: &str) -> Result<EfsLocationDetails>;

    async fn describe_location_smb(&self, location_arn: &str) -> Result<SmbLocationDetails>;

    async fn describe_location_nfs(&self, location_arn: &str) -> Result<NfsLocationDetails>;

    /// Every location ARN with the backend type parsed from its URI.
    async fn list_locations(&self) -> Result<HashMap<String, LocationType>>;

    /// Create a transfer task, returning its ARN.
    async fn create_task(&self, input: CreateTaskInput) -> Result<String>;

    async fn delete_task(&self, task_arn: &str) -> Result<()>;

    async fn describe_task(&self, task_arn: &str) -> Result<TransferTask>;

    /// ARNs of every execution of a task.
    async fn list_task_executions(&self, task_arn: &str) -> Result<Vec<String>>;

    async fn describe_task_execution(&self, execution_arn: &str) -> Result<MoverRun>;

    /// Start an execution, returning its ARN.
    async fn start_task_execution(&self, task_arn: &str) -> Result<String>;

    async fn cancel_task_execution(&self, execution_arn: &str) -> Result<()>;
}

/// DataSync client
pub struct DataSyncClient {
    client: Client,
}

impl DataSyncClient {
    /// Create a DataSync client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.datasync_client(),
        }
    }
}

fn to_chrono(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn to_datasync_tags(tags: &Tags) -> Result<Vec<TagListEntry>> {
    tags.iter()
        .map(|t| {
            TagListEntry::builder()
                .key(&t.key)
                .value(&t.value)
                .build()
                .map_err(|e| MoverError::internal(format!("failed to build DataSync tag: {e}")))
        })
        .collect()
}

fn required(value: Option<&str>, what: &str, arn: &str) -> Result<String> {
    value
        .map(str::to_string)
        .ok_or_else(|| MoverError::internal(format!("no {what} returned for {arn}")))
}

#[async_trait]
impl TransferService for DataSyncClient {
    async fn create_location_s3(&self, input: CreateS3LocationInput) -> Result<String> {
        let s3_config = S3Config::builder()
            .bucket_access_role_arn(&input.bucket_access_role_arn)
            .build()
            .map_err(|e| MoverError::internal(format!("failed to build S3 config: {e}")))?;

        let output = self
            .client
            .create_location_s3()
            .s3_bucket_arn(&input.bucket_arn)
            .s3_config(s3_config)
            .set_s3_storage_class(input.storage_class.as_deref().map(S3StorageClass::from))
            .set_subdirectory(input.subdirectory.clone())
            .set_tags(Some(to_datasync_tags(&input.tags)?))
            .send()
            .await
            .classify(|| format!("failed to create S3 location for {}", input.bucket_arn))?;

        required(output.location_arn(), "location ARN", &input.bucket_arn)
    }

    async fn delete_location(&self, location_arn: &str) -> Result<()> {
        self.client
            .delete_location()
            .location_arn(location_arn)
            .send()
            .await
            .classify(|| format!("failed to delete location {location_arn}"))?;
        Ok(())
    }

    async fn describe_location_s3(&self, location_arn: &str) -> Result<S3LocationDetails> {
        let out = self
            .client
            .describe_location_s3()
            .location_arn(location_arn)
            .send()
            .await
            .classify(|| format!("failed to describe S3 location {location_arn}"))?;

        Ok(S3LocationDetails {
            location_arn: location_arn.to_string(),
            location_uri: out.location_uri().unwrap_or_default().to_string(),
            s3_storage_class: out.s3_storage_class().map(|c| c.as_str().to_string()),
            bucket_access_role_arn: out
                .s3_config()
                .map(|c| c.bucket_access_role_arn().to_string()),
            creation_time: out.creation_time().and_then(to_chrono),
        })
    }

    async fn describe_location_efs(&self, location_arn: &str) -> Result<EfsLocationDetails> {
        let out = self
            .client
            .describe_location_efs()
            .location_arn(location_arn)
            .send()
            .await
            .classify(|| format!("failed to describe EFS location {location_arn}"))?;

        Ok(EfsLocationDetails {
            location_arn: location_arn.to_string(),
            location_uri: out.location_uri().unwrap_or_default().to_string(),
            creation_time: out.creation_time().and_then(to_chrono),
        })
    }

    async fn describe_location_smb(&self, location_arn: &str) -> Result<SmbLocationDetails> {
        let out = self
            .client
            .describe_location_smb()
            .location_arn(location_arn)
            .send()
            .await
            .classify(|| format!("failed to describe SMB location {location_arn}"))?;

        Ok(SmbLocationDetails {
            location_arn: location_arn.to_string(),
            location_uri: out.location_uri().unwrap_or_default().to_string(),
            user: out.user().map(str::to_string),
            domain: out.domain().map(str::to_string),
            agent_arns: out.agent_arns().to_vec(),
            creation_time: out.creation_time().and_then(to_chrono),
        })
    }

    async fn describe_location_nfs(&self, location_arn: &str) -> Result<NfsLocationDetails> {
        let out = self
            .client
            .describe_location_nfs()
            .location_arn(location_arn)
            .send()
            .await
            .classify(|| format!("failed to describe NFS location {location_arn}"))?;

        Ok(NfsLocationDetails {
            location_arn: location_arn.to_string(),
            location_uri: out.location_uri().unwrap_or_default().to_string(),
            agent_arns: out
                .on_prem_config()
                .map(|c| c.agent_arns().to_vec())
                .unwrap_or_default(),
            creation_time: out.creation_time().and_then(to_chrono),
        })
    }

    async fn list_locations(&self) -> Result<HashMap<String, LocationType>> {
        let mut locations = HashMap::new();
        let mut pages = self.client.list_locations().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.classify(|| "failed to list locations".to_string())?;
            for entry in page.locations() {
                let (Some(arn), Some(uri)) = (entry.location_arn(), entry.location_uri()) else {
                    continue;
                };
                match LocationType::from_uri(uri) {
                    Some(kind) => {
                        locations.insert(arn.to_string(), kind);
                    }
                    None => debug!(location_arn = %arn, uri = %uri, "Unrecognized location scheme"),
                }
            }
        }

        Ok(locations)
    }

    async fn create_task(&self, input: CreateTaskInput) -> Result<String> {
        let options = Options::builder()
            .preserve_deleted_files(PreserveDeletedFiles::from(TASK_PRESERVE_DELETED_FILES))
            .transfer_mode(TransferMode::from(TASK_TRANSFER_MODE))
            .verify_mode(VerifyMode::from(TASK_VERIFY_MODE))
            .build();

        let output = self
            .client
            .create_task()
            .name(&input.name)
            .source_location_arn(&input.source_location_arn)
            .destination_location_arn(&input.destination_location_arn)
            .options(options)
            .set_tags(Some(to_datasync_tags(&input.tags)?))
            .send()
            .await
            .classify(|| format!("failed to create task {}", input.name))?;

        required(output.task_arn(), "task ARN", &input.name)
    }

    async fn delete_task(&self, task_arn: &str) -> Result<()> {
        self.client
            .delete_task()
            .task_arn(task_arn)
            .send()
            .await
            .classify(|| format!("failed to delete task {task_arn}"))?;
        Ok(())
    }

    async fn describe_task(&self, task_arn: &str) -> Result<TransferTask> {
        let out = self
            .client
            .describe_task()
            .task_arn(task_arn)
            .send()
            .await
            .classify(|| format!("failed to describe task {task_arn}"))?;

        Ok(TransferTask {
            task_arn: out.task_arn().unwrap_or(task_arn).to_string(),
            name: out.name().map(str::to_string),
            status: out
                .status()
                .map(|s| TransferTaskStatus::from_service(s.as_str()))
                .unwrap_or(TransferTaskStatus::Unavailable),
            source_location_arn: required(out.source_location_arn(), "source location", task_arn)?,
            destination_location_arn: required(
                out.destination_location_arn(),
                "destination location",
                task_arn,
            )?,
            current_task_execution_arn: out.current_task_execution_arn().map(str::to_string),
            creation_time: out.creation_time().and_then(to_chrono),
        })
    }

    async fn list_task_executions(&self, task_arn: &str) -> Result<Vec<String>> {
        let mut executions = Vec::new();
        let mut pages = self
            .client
            .list_task_executions()
            .task_arn(task_arn)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.classify(|| format!("failed to list executions of {task_arn}"))?;
            executions.extend(
                page.task_executions()
                    .iter()
                    .filter_map(|e| e.task_execution_arn().map(str::to_string)),
            );
        }

        Ok(executions)
    }

    async fn describe_task_execution(&self, execution_arn: &str) -> Result<MoverRun> {
        let out = self
            .client
            .describe_task_execution()
            .task_execution_arn(execution_arn)
            .send()
            .await
            .classify(|| format!("failed to describe execution {execution_arn}"))?;

        Ok(MoverRun {
            bytes_transferred: out.bytes_transferred().into(),
            bytes_written: out.bytes_written().into(),
            estimated_bytes_to_transfer: out.estimated_bytes_to_transfer().into(),
            estimated_files_to_transfer: out.estimated_files_to_transfer().into(),
            files_transferred: out.files_transferred().into(),
            start_time: out.start_time().and_then(to_chrono),
            status: out.status().map(|s| s.as_str().to_string()),
            result: out.result().map(|r| RunResult {
                transfer_status: r.transfer_status().map(|s| s.as_str().to_string()),
                verify_status: r.verify_status().map(|s| s.as_str().to_string()),
                error_code: r.error_code().map(str::to_string),
                error_detail: r.error_detail().map(str::to_string),
            }),
        })
    }

    async fn start_task_execution(&self, task_arn: &str) -> Result<String> {
        let out = self
            .client
            .start_task_execution()
            .task_arn(task_arn)
            .send()
            .await
            .classify(|| format!("failed to start task {task_arn}"))?;

        required(out.task_execution_arn(), "execution ARN", task_arn)
    }

    async fn cancel_task_execution(&self, execution_arn: &str) -> Result<()> {
        self.client
            .cancel_task_execution()
            .task_execution_arn(execution_arn)
            .send()
            .await
            .classify(|| format!("failed to cancel execution {execution_arn}"))?;
        Ok(())
    }
}
