//! Status enums for async tasks and transfer tasks

use serde::{Deserialize, Serialize};

/// Lifecycle of an async orchestration task.
///
/// `Created -> Running -> {Failed | Complete}`. Terminal states are final.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskState {
    #[default]
    Created,
    Running,
    Failed,
    Complete,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Complete)
    }
}

/// Status of a DataSync transfer task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TransferTaskStatus {
    Available,
    Creating,
    Queued,
    Running,
    Unavailable,
}

impl TransferTaskStatus {
    /// Parse a status reported by the service, treating anything unknown as unavailable.
    pub fn from_service(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminal() {
        assert!(!TaskState::Created.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Complete.is_terminal());
        assert_eq!(TaskState::Complete.to_string(), "complete");
        assert_eq!("FAILED".parse::<TaskState>(), Ok(TaskState::Failed));
    }

    #[test]
    fn test_transfer_status_from_service() {
        assert_eq!(TransferTaskStatus::from_service("RUNNING"), TransferTaskStatus::Running);
        assert_eq!(
            TransferTaskStatus::from_service("AVAILABLE"),
            TransferTaskStatus::Available
        );
        assert_eq!(
            TransferTaskStatus::from_service("SOMETHING_NEW"),
            TransferTaskStatus::Unavailable
        );
        assert_eq!(TransferTaskStatus::Running.to_string(), "RUNNING");
    }
}
