//! Location backend kinds
//!
//! DataSync supports several location backends. Only S3 locations can be
//! created and deleted here; the others are describe-only, since they may
//! appear as one side of a mover created elsewhere.

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum LocationType {
    /// Bulk object store (S3)
    #[strum(serialize = "S3")]
    #[serde(rename = "S3")]
    S3,
    /// Network filesystem (EFS)
    #[strum(serialize = "EFS")]
    #[serde(rename = "EFS")]
    Efs,
    /// SMB share
    #[strum(serialize = "SMB")]
    #[serde(rename = "SMB")]
    Smb,
    /// NFS share
    #[strum(serialize = "NFS")]
    #[serde(rename = "NFS")]
    Nfs,
}

impl LocationType {
    /// Whether locations of this kind can be created and deleted.
    pub fn is_provisionable(self) -> bool {
        matches!(self, Self::S3)
    }

    /// Infer the backend from a location URI such as `s3://bucket/prefix/`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (scheme, _) = uri.split_once(':')?;
        scheme.parse().ok()
    }
}
