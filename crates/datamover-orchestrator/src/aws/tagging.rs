//! Resource Groups Tagging API client
//!
//! The tag index is the only way to find movers by org and group: DataSync
//! has no native grouping, so identity lives entirely in tags.

use async_trait::async_trait;
use aws_sdk_resourcegroupstagging::Client;
use aws_sdk_resourcegroupstagging::types::TagFilter as SdkTagFilter;
use datamover_common::tags::TagFilter;
use datamover_common::{Result, Tag, Tags};

use super::context::AwsContext;
use super::error::SdkResultExt;

/// A resource returned by the tag index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResource {
    pub arn: String,
    pub tags: Tags,
}

/// Tag search operations the orchestrator depends on.
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// Resources of the given types (e.g. `datasync`, `datasync:task`)
    /// matching every filter.
    async fn get_resources(
        &self,
        resource_types: &[&str],
        filters: &[TagFilter],
    ) -> Result<Vec<TaggedResource>>;
}

pub struct TaggingClient {
    client: Client,
}

impl TaggingClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.tagging_client(),
        }
    }
}

#[async_trait]
impl TagIndex for TaggingClient {
    async fn get_resources(
        &self,
        resource_types: &[&str],
        filters: &[TagFilter],
    ) -> Result<Vec<TaggedResource>> {
        let sdk_filters = filters
            .iter()
            .map(|f| {
                SdkTagFilter::builder()
                    .key(&f.key)
                    .set_values(Some(f.values.clone()))
                    .build()
            })
            .collect();

        let mut pages = self
            .client
            .get_resources()
            .set_resource_type_filters(Some(
                resource_types.iter().map(|t| t.to_string()).collect(),
            ))
            .set_tag_filters(Some(sdk_filters))
            .into_paginator()
            .send();

        let mut resources = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.classify(|| format!("failed to query tag index for {resource_types:?}"))?;
            for mapping in page.resource_tag_mapping_list() {
                let Some(arn) = mapping.resource_arn() else {
                    continue;
                };
                let tags = mapping
                    .tags()
                    .iter()
                    .map(|t| Tag::new(t.key(), t.value()))
                    .collect();
                resources.push(TaggedResource {
                    arn: arn.to_string(),
                    tags,
                });
            }
        }

        Ok(resources)
    }
}
