//! datamover-common - Shared types and utilities
//!
//! This crate provides the types shared by the orchestrator and its test
//! fixtures, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`arn`]: ARN parsing and DataSync identifier helpers
//! - [`defaults`]: Default configuration values
//! - [`error`]: Error taxonomy surfaced to callers
//! - [`location`]: Location backend kinds
//! - [`model`]: Request and description types for data movers
//! - [`policy`]: IAM policy documents with structural comparison
//! - [`status`]: Async task and transfer task status enums
//! - [`tags`]: Tag model and identity-tag normalization

pub mod arn;
pub mod defaults;
pub mod error;
pub mod location;
pub mod model;
pub mod policy;
pub mod status;
pub mod tags;

// Re-export commonly used types
pub use arn::Arn;
pub use error::{ErrorKind, MoverError, Result};
pub use location::LocationType;
pub use model::{
    LocationDescription, LocationInput, MoverCreateRequest, MoverDescription, MoverRun,
    S3LocationInput, TransferTask,
};
pub use policy::PolicyDocument;
pub use status::{TaskState, TransferTaskStatus};
pub use tags::{Tag, Tags};
