//! Bucket access roles
//!
//! Every S3 location needs a role the transfer service can assume to reach
//! the bucket. The role lives under the group's path and carries one inline
//! policy granting bucket access. Ensuring a role is idempotent: an existing
//! role with an equivalent policy is left alone.

use datamover_common::defaults::{BUCKET_ACCESS_POLICY_NAME, BUCKET_ACCESS_ROLE_DESCRIPTION};
use datamover_common::policy::{PolicyDocument, assume_role_policy, bucket_access_policy};
use datamover_common::{MoverError, Result, Tags};
use tracing::{debug, info, warn};

use crate::aws::{CreateRoleInput, RoleStore};

/// A role that is ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredRole {
    pub arn: String,
    /// Whether this call created the role
    pub created: bool,
}

/// Make sure `role_name` exists under `path` with access to `bucket_arn`.
pub async fn ensure_role(
    roles: &dyn RoleStore,
    path: &str,
    role_name: &str,
    bucket_arn: &str,
    tags: &Tags,
) -> Result<EnsuredRole> {
    if path.is_empty() || role_name.is_empty() || bucket_arn.is_empty() {
        return Err(MoverError::bad_request("invalid input"));
    }

    info!(role = %role_name, path = %path, "Ensuring bucket access role");
    let wanted = bucket_access_policy(bucket_arn);

    let role = match roles.get_role(role_name).await {
        Ok(role) => {
            if current_policy_matches(roles, role_name, &wanted).await? {
                debug!(role = %role_name, "Role and policy already up to date");
                return Ok(EnsuredRole {
                    arn: role.arn,
                    created: false,
                });
            }
            EnsuredRole {
                arn: role.arn,
                created: false,
            }
        }
        Err(e) if e.is_not_found() => {
            debug!(role = %role_name, "Role not found, creating");
            let role = roles
                .create_role(CreateRoleInput {
                    path: path.to_string(),
                    name: role_name.to_string(),
                    assume_role_policy: assume_role_policy().to_string(),
                    description: BUCKET_ACCESS_ROLE_DESCRIPTION.to_string(),
                })
                .await?;
            info!(role = %role_name, arn = %role.arn, "Created bucket access role");
            EnsuredRole {
                arn: role.arn,
                created: true,
            }
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = attach_policy(roles, role_name, &wanted, tags).await {
        if role.created {
            warn!(role = %role_name, error = %e, "Policy attach failed, removing new role");
            if let Err(cleanup) = delete_access_role(roles, &role.arn).await {
                warn!(role = %role_name, error = %cleanup, "Failed to remove new role");
            }
        }
        return Err(e);
    }

    Ok(role)
}

/// Whether the role's inline policy already grants what `wanted` grants.
async fn current_policy_matches(
    roles: &dyn RoleStore,
    role_name: &str,
    wanted: &PolicyDocument,
) -> Result<bool> {
    match roles
        .get_role_policy(role_name, BUCKET_ACCESS_POLICY_NAME)
        .await
    {
        Ok(doc) => match PolicyDocument::from_json(&doc) {
            Ok(current) if current.equivalent(wanted) => Ok(true),
            Ok(_) => {
                info!(role = %role_name, "Bucket access policy out of date, updating");
                Ok(false)
            }
            Err(e) => {
                warn!(role = %role_name, error = %e, "Unreadable bucket access policy, replacing");
                Ok(false)
            }
        },
        Err(e) if e.is_not_found() => {
            info!(role = %role_name, "Bucket access policy missing, attaching");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn attach_policy(
    roles: &dyn RoleStore,
    role_name: &str,
    policy: &PolicyDocument,
    tags: &Tags,
) -> Result<()> {
    let document = policy
        .to_json()
        .map_err(|e| MoverError::internal(format!("failed to encode policy: {e}")))?;
    roles
        .put_role_policy(role_name, BUCKET_ACCESS_POLICY_NAME, &document)
        .await?;

    if !tags.is_empty() {
        roles.tag_role(role_name, tags.as_slice()).await?;
    }
    Ok(())
}

/// Delete a bucket access role and its inline policies.
///
/// A role that no longer exists counts as deleted.
pub async fn delete_access_role(roles: &dyn RoleStore, role_arn: &str) -> Result<()> {
    let role_name = datamover_common::arn::role_name_from_arn(role_arn)
        .map_err(|e| MoverError::bad_request(e.to_string()))?;

    let policies = match roles.list_role_policies(&role_name).await {
        Ok(policies) => policies,
        Err(e) if e.is_not_found() => {
            debug!(role = %role_name, "Role already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for policy in &policies {
        match roles.delete_role_policy(&role_name, policy).await {
            Ok(()) => debug!(role = %role_name, policy = %policy, "Deleted inline policy"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    match roles.delete_role(&role_name).await {
        Ok(()) => {
            info!(role = %role_name, "Deleted bucket access role");
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
