//! Harness for driving the orchestrator against the in-memory cloud

#![allow(dead_code)]

use anyhow::bail;
use async_trait::async_trait;
use datamover_common::{MoverCreateRequest, TaskState};
use datamover_orchestrator::aws::MemoryCloud;
use datamover_orchestrator::{
    AsyncTask, Backends, MemoryTaskStore, Orchestrator, RetryPolicy, TaskStore,
};
use std::sync::Arc;
use std::time::Duration;

pub const ORG: &str = "acme";
pub const GROUP: &str = "g1";
pub const SOURCE_BUCKET: &str = "src-bucket";
pub const DESTINATION_BUCKET: &str = "dst-bucket";

pub struct Harness {
    pub cloud: Arc<MemoryCloud>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTaskStore::new()))
    }

    pub fn with_store(store: Arc<dyn TaskStore>) -> Self {
        Self::build(Arc::new(MemoryCloud::new()), ORG, store, RetryPolicy::immediate(3))
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self::build(
            Arc::new(MemoryCloud::new()),
            ORG,
            Arc::new(MemoryTaskStore::new()),
            retry,
        )
    }

    /// Another orchestrator on the same cloud, acting for `org`.
    pub fn for_org(&self, org: &str) -> Self {
        Self::build(
            self.cloud.clone(),
            org,
            Arc::new(MemoryTaskStore::new()),
            RetryPolicy::immediate(3),
        )
    }

    fn build(
        cloud: Arc<MemoryCloud>,
        org: &str,
        store: Arc<dyn TaskStore>,
        retry: RetryPolicy,
    ) -> Self {
        let orchestrator =
            Orchestrator::new(org, Backends::memory(cloud.clone()), store).with_retry(retry);
        Self {
            cloud,
            orchestrator,
        }
    }

    /// Run a create to completion and return the final task.
    pub async fn create_and_wait(&self, group: &str, request: MoverCreateRequest) -> AsyncTask {
        let task = self
            .orchestrator
            .create(group, request)
            .await
            .expect("create accepted");
        self.orchestrator.wait_for_background().await;
        self.orchestrator
            .task_status(&task.id)
            .await
            .expect("task recorded")
    }

    /// Create the mover `name` in `group` between the standard buckets.
    pub async fn provision(&self, group: &str, name: &str) -> AsyncTask {
        let request = datamover_test_utils::s3_request(name, SOURCE_BUCKET, DESTINATION_BUCKET);
        let task = self.create_and_wait(group, request).await;
        assert_eq!(task.state, TaskState::Complete, "create failed: {task:?}");
        task
    }
}

pub fn messages(task: &AsyncTask) -> Vec<&str> {
    task.events.iter().map(|e| e.message.as_str()).collect()
}

/// Poll until `check` holds, panicking after a few seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A task store that is down: every call fails.
pub struct UnavailableStore;

#[async_trait]
impl TaskStore for UnavailableStore {
    async fn create(&self, _task: &AsyncTask) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn start(&self, _id: &str) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn check_in(&self, _id: &str) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn log(&self, _id: &str, _message: &str) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn fail(&self, _id: &str, _reason: &str) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn complete(&self, _id: &str) -> anyhow::Result<()> {
        bail!("task database unavailable")
    }
    async fn get(&self, _id: &str) -> anyhow::Result<Option<AsyncTask>> {
        bail!("task database unavailable")
    }
}
