//! SQLite-backed task store
//!
//! Lets `datamover task-status` poll a task started by another process.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datamover_common::TaskState;
use directories::ProjectDirs;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{AsyncTask, TaskEvent, TaskStore};

/// Default location of the task database
pub fn default_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "datamover").context("Failed to get project directories")?;

    let state_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(state_dir).context("Failed to create state directory")?;

    Ok(state_dir.join("tasks.db"))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp '{s}'"))?
        .with_timezone(&Utc))
}

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open the task database at `path`, creating it if needed
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open task database {}", path.display()))?;

        let store = Self { pool };
        store.setup_schema().await?;
        Ok(store)
    }

    /// A private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory task database")?;

        let store = Self { pool };
        store.setup_schema().await?;
        Ok(store)
    }

    async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS async_tasks (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                failure TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                checked_in_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS async_task_events (
                id INTEGER PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES async_tasks(id),
                at TEXT NOT NULL,
                message TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_task ON async_task_events(task_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn state_of(&self, id: &str) -> Result<TaskState> {
        let state: Option<String> = sqlx::query_scalar("SELECT state FROM async_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match state {
            Some(s) => s.parse().with_context(|| format!("invalid state '{s}'")),
            None => bail!("task {id} not found"),
        }
    }

    async fn finish(&self, id: &str, state: TaskState, reason: Option<&str>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE async_tasks SET state = ?, failure = ?, updated_at = ?
             WHERE id = ? AND state NOT IN ('failed', 'complete')",
        )
        .bind(state.as_ref())
        .bind(reason)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.state_of(id).await?;
            bail!("task {id} is already {current}");
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: &AsyncTask) -> Result<()> {
        sqlx::query(
            "INSERT INTO async_tasks (id, state, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(TaskState::Created.as_ref())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create task {}", task.id))?;

        Ok(())
    }

    async fn start(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE async_tasks SET state = ?, updated_at = ? WHERE id = ? AND state = ?",
        )
        .bind(TaskState::Running.as_ref())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(TaskState::Created.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.state_of(id).await?;
            bail!("task {id} is already {current}");
        }
        Ok(())
    }

    async fn check_in(&self, id: &str) -> Result<()> {
        if self.state_of(id).await?.is_terminal() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE async_tasks SET checked_in_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log(&self, id: &str, message: &str) -> Result<()> {
        if self.state_of(id).await?.is_terminal() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO async_task_events (task_id, at, message) VALUES (?, ?, ?)")
            .bind(id)
            .bind(&now)
            .bind(message)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE async_tasks SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fail(&self, id: &str, reason: &str) -> Result<()> {
        self.finish(id, TaskState::Failed, Some(reason)).await
    }

    async fn complete(&self, id: &str) -> Result<()> {
        self.finish(id, TaskState::Complete, None).await
    }

    async fn get(&self, id: &str) -> Result<Option<AsyncTask>> {
        let Some(row) = sqlx::query(
            "SELECT id, state, failure, created_at, updated_at, checked_in_at
             FROM async_tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let events = sqlx::query_as::<_, (String, String)>(
            "SELECT at, message FROM async_task_events WHERE task_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(at, message)| -> Result<TaskEvent> {
            Ok(TaskEvent {
                at: parse_time(&at)?,
                message,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let state: String = row.try_get("state")?;
        let checked_in_at: Option<String> = row.try_get("checked_in_at")?;

        Ok(Some(AsyncTask {
            id: row.try_get("id")?,
            state: state
                .parse()
                .with_context(|| format!("invalid state '{state}'"))?,
            events,
            failure: row.try_get("failure")?,
            created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
            updated_at: parse_time(&row.try_get::<String, _>("updated_at")?)?,
            checked_in_at: checked_in_at.as_deref().map(parse_time).transpose()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        let task = AsyncTask::new();

        store.create(&task).await.unwrap();
        let created = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(created.state, TaskState::Created);

        store.start(&task.id).await.unwrap();
        store.log(&task.id, "requested creation of source location").await.unwrap();
        store.check_in(&task.id).await.unwrap();
        store.log(&task.id, "requested creation of destination location").await.unwrap();

        let running = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(running.state, TaskState::Running);
        assert_eq!(running.events.len(), 2);
        assert_eq!(running.events[0].message, "requested creation of source location");
        assert!(running.checked_in_at.is_some());

        store.fail(&task.id, "failed to create destination location").await.unwrap();
        let failed = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(failed.state, TaskState::Failed);
        assert_eq!(
            failed.failure.as_deref(),
            Some("failed to create destination location")
        );
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        let task = AsyncTask::new();
        store.create(&task).await.unwrap();
        store.start(&task.id).await.unwrap();
        store.complete(&task.id).await.unwrap();

        let err = store.fail(&task.id, "late").await.unwrap_err();
        assert!(err.to_string().contains("already complete"));
        store.log(&task.id, "ignored").await.unwrap();

        let done = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(done.state, TaskState::Complete);
        assert!(done.events.is_empty());
    }

    #[tokio::test]
    async fn test_missing_task() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.start("missing").await.is_err());
        assert!(store.complete("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let task = AsyncTask::new();

        {
            let store = SqliteTaskStore::open(&path).await.unwrap();
            store.create(&task).await.unwrap();
            store.start(&task.id).await.unwrap();
            store.complete(&task.id).await.unwrap();
        }

        let store = SqliteTaskStore::open(&path).await.unwrap();
        let reloaded = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, TaskState::Complete);
    }
}
