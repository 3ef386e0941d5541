//! datamover-orchestrator - DataSync data mover orchestration
//!
//! Provisions, inspects and tears down data movers: an S3 source and
//! destination location, each with its own bucket access role, bound by a
//! DataSync transfer task. Creates run in the background and are tracked
//! through an async task store.

pub mod aws;
pub mod config;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use orchestrator::{Backends, Orchestrator};
pub use retry::RetryPolicy;
pub use store::{AsyncTask, MemoryTaskStore, SqliteTaskStore, TaskStore};
