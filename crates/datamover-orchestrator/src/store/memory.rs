//! Process-local task store

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use datamover_common::TaskState;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AsyncTask, TaskEvent, TaskStore};

/// Task store kept in memory, visible only to this process.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, AsyncTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut AsyncTask) -> Result<()> + Send,
    {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(id) else {
            bail!("task {id} not found");
        };
        f(task)?;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn finish(&self, id: &str, state: TaskState, reason: Option<&str>) -> Result<()> {
        self.update(id, |task| {
            if task.state.is_terminal() {
                bail!("task {id} is already {}", task.state);
            }
            task.state = state;
            task.failure = reason.map(str::to_string);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: &AsyncTask) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            bail!("task {} already exists", task.id);
        }
        let mut task = task.clone();
        task.state = TaskState::Created;
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.update(id, |task| {
            if task.state != TaskState::Created {
                bail!("task {id} is already {}", task.state);
            }
            task.state = TaskState::Running;
            Ok(())
        })
        .await
    }

    async fn check_in(&self, id: &str) -> Result<()> {
        self.update(id, |task| {
            if !task.state.is_terminal() {
                task.checked_in_at = Some(Utc::now());
            }
            Ok(())
        })
        .await
    }

    async fn log(&self, id: &str, message: &str) -> Result<()> {
        self.update(id, |task| {
            if !task.state.is_terminal() {
                task.events.push(TaskEvent {
                    at: Utc::now(),
                    message: message.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn fail(&self, id: &str, reason: &str) -> Result<()> {
        self.finish(id, TaskState::Failed, Some(reason)).await
    }

    async fn complete(&self, id: &str) -> Result<()> {
        self.finish(id, TaskState::Complete, None).await
    }

    async fn get(&self, id: &str) -> Result<Option<AsyncTask>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }
}
