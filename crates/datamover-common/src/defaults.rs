//! Default configuration values shared across crates.

/// Service principal of the transfer service.
pub const TRANSFER_SERVICE_PRINCIPAL: &str = "datasync.amazonaws.com";

/// Name of the inline policy attached to bucket access roles.
pub const BUCKET_ACCESS_POLICY_NAME: &str = "DataSyncBucketAccessPolicy";

/// Description set on newly created bucket access roles.
pub const BUCKET_ACCESS_ROLE_DESCRIPTION: &str = "DataSync bucket access role";

/// Attempts made when creating a location whose role may still be propagating.
pub const DEFAULT_LOCATION_RETRY_ATTEMPTS: usize = 6;

/// Fixed delay between location creation attempts, in seconds.
pub const DEFAULT_LOCATION_RETRY_DELAY_SECS: u64 = 5;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Transfer task option: keep files at the destination that were deleted at the source.
pub const TASK_PRESERVE_DELETED_FILES: &str = "PRESERVE";

/// Transfer task option: only copy data that changed.
pub const TASK_TRANSFER_MODE: &str = "CHANGED";

/// Transfer task option: verify only the files that were transferred.
pub const TASK_VERIFY_MODE: &str = "ONLY_FILES_TRANSFERRED";

/// Managed policies granted to sessions.
pub mod managed_policy {
    pub const DATASYNC_FULL_ACCESS: &str = "arn:aws:iam::aws:policy/AWSDataSyncFullAccess";
    pub const DATASYNC_READ_ONLY: &str = "arn:aws:iam::aws:policy/AWSDataSyncReadOnlyAccess";
    pub const TAG_EDITOR_READ_ONLY: &str =
        "arn:aws:iam::aws:policy/ResourceGroupsandTagEditorReadOnlyAccess";
}

/// IAM path that scopes roles to an org and group.
pub fn role_path(org: &str, group: &str) -> String {
    format!("/spinup/{org}/{group}/")
}

/// Name of the bucket access role for `mover` on `bucket`.
pub fn bucket_access_role_name(mover: &str, bucket: &str) -> String {
    format!("{mover}-{bucket}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_naming() {
        assert_eq!(role_path("acme", "g1"), "/spinup/acme/g1/");
        assert_eq!(bucket_access_role_name("mover1", "b1"), "mover1-b1");
    }
}
