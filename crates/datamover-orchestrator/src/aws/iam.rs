//! IAM role store for bucket access roles

use async_trait::async_trait;
use aws_sdk_iam::Client;
use datamover_common::{MoverError, Result, Tag};
use percent_encoding::percent_decode_str;
use tracing::debug;

use super::context::AwsContext;
use super::error::SdkResultExt;

/// An IAM role as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub arn: String,
    pub path: String,
}

/// Input for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    pub path: String,
    pub name: String,
    pub assume_role_policy: String,
    pub description: String,
}

/// Role operations the orchestrator depends on.
///
/// Implemented by [`IamClient`] against AWS and by
/// [`MemoryCloud`](super::memory::MemoryCloud) in memory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Get a role by name. Missing roles are `NotFound`.
    async fn get_role(&self, role_name: &str) -> Result<Role>;

    async fn create_role(&self, input: CreateRoleInput) -> Result<Role>;

    /// Get an inline policy document as JSON. Missing policies are `NotFound`.
    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> Result<String>;

    /// Create or overwrite an inline policy.
    async fn put_role_policy(&self, role_name: &str, policy_name: &str, document: &str)
    -> Result<()>;

    async fn tag_role(&self, role_name: &str, tags: &[Tag]) -> Result<()>;

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>>;

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()>;

    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

/// IAM client for managing bucket access roles
pub struct IamClient {
    client: Client,
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

fn to_role(role: &aws_sdk_iam::types::Role) -> Role {
    Role {
        name: role.role_name().to_string(),
        arn: role.arn().to_string(),
        path: role.path().to_string(),
    }
}

#[async_trait]
impl RoleStore for IamClient {
    async fn get_role(&self, role_name: &str) -> Result<Role> {
        let output = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .classify(|| format!("failed to get role {role_name}"))?;

        output
            .role()
            .map(to_role)
            .ok_or_else(|| MoverError::not_found(format!("role {role_name}")))
    }

    async fn create_role(&self, input: CreateRoleInput) -> Result<Role> {
        let output = self
            .client
            .create_role()
            .path(&input.path)
            .role_name(&input.name)
            .assume_role_policy_document(&input.assume_role_policy)
            .description(&input.description)
            .send()
            .await
            .classify(|| format!("failed to create role {}{}", input.path, input.name))?;

        output.role().map(to_role).ok_or_else(|| {
            MoverError::internal(format!("no role returned creating {}", input.name))
        })
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> Result<String> {
        let output = self
            .client
            .get_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .classify(|| format!("failed to get policy {policy_name} of role {role_name}"))?;

        // IAM returns policy documents URL-encoded
        let document = percent_decode_str(output.policy_document())
            .decode_utf8()
            .map_err(|e| {
                MoverError::internal(format!("policy {policy_name} is not valid UTF-8: {e}"))
            })?;

        Ok(document.into_owned())
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .classify(|| format!("failed to put policy {policy_name} on role {role_name}"))?;

        debug!(role_name = %role_name, policy_name = %policy_name, "Put inline role policy");
        Ok(())
    }

    async fn tag_role(&self, role_name: &str, tags: &[Tag]) -> Result<()> {
        let iam_tags = tags
            .iter()
            .map(|t| {
                aws_sdk_iam::types::Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
                    .map_err(|e| MoverError::internal(format!("failed to build IAM tag: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .tag_role()
            .role_name(role_name)
            .set_tags(Some(iam_tags))
            .send()
            .await
            .classify(|| format!("failed to tag role {role_name}"))?;

        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pages = self
            .client
            .list_role_policies()
            .role_name(role_name)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.classify(|| format!("failed to list policies of role {role_name}"))?;
            names.extend(page.policy_names().iter().cloned());
        }

        Ok(names)
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        self.client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .classify(|| format!("failed to delete policy {policy_name} of role {role_name}"))?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .classify(|| format!("failed to delete role {role_name}"))?;
        Ok(())
    }
}
