//! Async task store
//!
//! Records the progress of background orchestration tasks so callers can
//! poll them. Terminal states are final: once a task has failed or
//! completed, further logs and check-ins are ignored and a second terminal
//! transition is rejected.

mod memory;
mod sqlite;

pub use memory::MemoryTaskStore;
pub use sqlite::{SqliteTaskStore, default_db_path};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datamover_common::TaskState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A progress message recorded against a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// An async orchestration task as seen by pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncTask {
    pub id: String,
    pub state: TaskState,
    pub events: Vec<TaskEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl AsyncTask {
    /// Allocate a new task in the `created` state.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state: TaskState::Created,
            events: Vec::new(),
            failure: None,
            created_at: now,
            updated_at: now,
            checked_in_at: None,
        }
    }
}

impl Default for AsyncTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence for async tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Record a new task in the `created` state.
    async fn create(&self, task: &AsyncTask) -> Result<()>;

    /// Mark a created task running.
    async fn start(&self, id: &str) -> Result<()>;

    /// Heartbeat.
    async fn check_in(&self, id: &str) -> Result<()>;

    /// Append a progress message.
    async fn log(&self, id: &str, message: &str) -> Result<()>;

    /// Mark the task failed with `reason`.
    async fn fail(&self, id: &str, reason: &str) -> Result<()>;

    /// Mark the task complete.
    async fn complete(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<AsyncTask>>;
}
