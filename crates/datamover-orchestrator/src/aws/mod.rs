//! AWS client modules for the orchestrator
//!
//! This module provides wrappers around AWS SDK clients for:
//! - DataSync: locations, tasks and task executions
//! - IAM: bucket access roles and their inline policies
//! - Resource Groups Tagging API: tag-based discovery
//! - STS: scoped sessions in target accounts
//!
//! Each client implements a trait ([`TransferService`], [`RoleStore`],
//! [`TagIndex`]) so the orchestrator can run against [`MemoryCloud`] too.

pub mod account;
pub mod context;
pub mod datasync;
pub mod error;
pub mod iam;
pub mod memory;
pub mod session;
pub mod tagging;

pub use account::AccountId;
pub use context::AwsContext;
pub use datasync::{CreateS3LocationInput, CreateTaskInput, DataSyncClient, TransferService};
pub use error::{SdkResultExt, classify_sdk_error, classify_service_code};
pub use iam::{CreateRoleInput, IamClient, Role, RoleStore};
#[cfg(test)]
pub use iam::MockRoleStore;
pub use memory::{CloudOp, Failure, MemoryCloud};
pub use session::{Operation, PermissionSet, SessionParams};
pub use tagging::{TagIndex, TaggedResource, TaggingClient};
