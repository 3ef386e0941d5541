//! Shared test utilities for datamover
//!
//! Helpers used by the orchestrator's integration tests without pulling the
//! orchestrator itself in as a dependency.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test run ids
//! - [`fixtures`]: mover names, bucket ARNs and create requests

pub mod aws;
pub mod fixtures;

// Re-export commonly used items
pub use aws::{get_test_region, test_run_id};
pub use fixtures::{bucket_arn, mover_name, s3_location, s3_request};
