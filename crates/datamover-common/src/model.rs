//! Request and description types for data movers
//!
//! Field names follow the PascalCase JSON shape callers already send.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{MoverError, Result};
use crate::location::LocationType;
use crate::status::TransferTaskStatus;
use crate::tags::Tags;

/// Pattern every mover name must match.
pub const NAME_PATTERN: &str = "^[A-Za-z0-9-]+$";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("name pattern is a valid regex"));

/// Validate a mover name.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(MoverError::bad_request(format!(
            "Name doesn't match regex {NAME_PATTERN}"
        )))
    }
}

/// Request to create a data mover.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoverCreateRequest {
    pub name: Option<String>,
    pub source: Option<LocationInput>,
    pub destination: Option<LocationInput>,
    #[serde(default)]
    pub tags: Tags,
}

impl MoverCreateRequest {
    /// Synchronous input validation. Returns the validated name.
    pub fn validate(&self) -> Result<&str> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| MoverError::bad_request("Name is a required field"))?;
        validate_name(name)?;

        match (&self.source, &self.destination) {
            (Some(src), Some(dst)) if !src.kind.is_empty() && !dst.kind.is_empty() => Ok(name),
            _ => Err(MoverError::bad_request(
                "Source and Destination are required",
            )),
        }
    }
}

/// One side of a mover. Only S3 inputs can be provisioned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationInput {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "S3", default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3LocationInput>,
}

impl LocationInput {
    pub fn s3(input: S3LocationInput) -> Self {
        Self {
            kind: LocationType::S3.to_string(),
            s3: Some(input),
        }
    }

    /// The backend kind, if it names a known one.
    pub fn location_type(&self) -> Option<LocationType> {
        self.kind.parse().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3LocationInput {
    pub s3_bucket_arn: String,
    /// One of STANDARD, STANDARD_IA, ONEZONE_IA, INTELLIGENT_TIERING,
    /// GLACIER, DEEP_ARCHIVE, OUTPOSTS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,
}

/// A DataSync transfer task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferTask {
    pub task_arn: String,
    pub name: Option<String>,
    pub status: TransferTaskStatus,
    pub source_location_arn: String,
    pub destination_location_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_execution_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3LocationDetails {
    pub location_arn: String,
    pub location_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_access_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EfsLocationDetails {
    pub location_arn: String,
    pub location_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmbLocationDetails {
    pub location_arn: String,
    pub location_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub agent_arns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NfsLocationDetails {
    pub location_arn: String,
    pub location_uri: String,
    #[serde(default)]
    pub agent_arns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

/// Backend-specific description of a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum LocationDescription {
    #[serde(rename = "S3")]
    S3(S3LocationDetails),
    #[serde(rename = "EFS")]
    Efs(EfsLocationDetails),
    #[serde(rename = "SMB")]
    Smb(SmbLocationDetails),
    #[serde(rename = "NFS")]
    Nfs(NfsLocationDetails),
}

impl LocationDescription {
    pub fn location_type(&self) -> LocationType {
        match self {
            Self::S3(_) => LocationType::S3,
            Self::Efs(_) => LocationType::Efs,
            Self::Smb(_) => LocationType::Smb,
            Self::Nfs(_) => LocationType::Nfs,
        }
    }

    pub fn location_arn(&self) -> &str {
        match self {
            Self::S3(l) => &l.location_arn,
            Self::Efs(l) => &l.location_arn,
            Self::Smb(l) => &l.location_arn,
            Self::Nfs(l) => &l.location_arn,
        }
    }

    /// The access role attached to the location, if it has one.
    pub fn access_role_arn(&self) -> Option<&str> {
        match self {
            Self::S3(l) => l.bucket_access_role_arn.as_deref(),
            _ => None,
        }
    }
}

/// A fully described data mover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoverDescription {
    pub task: TransferTask,
    pub source: Option<LocationDescription>,
    pub destination: Option<LocationDescription>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

/// Result detail of a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// One execution of a mover's transfer task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoverRun {
    pub bytes_transferred: Option<i64>,
    pub bytes_written: Option<i64>,
    pub estimated_bytes_to_transfer: Option<i64>,
    pub estimated_files_to_transfer: Option<i64>,
    pub files_transferred: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub result: Option<RunResult>,
}
