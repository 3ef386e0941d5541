//! ARN parsing and DataSync identifier helpers

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ARN '{0}'")]
pub struct ArnError(pub String);

/// A parsed Amazon Resource Name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(s: &str) -> Result<Self, ArnError> {
        let mut parts = s.splitn(6, ':');
        let (Some("arn"), Some(partition), Some(service), Some(region), Some(account), Some(resource)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(ArnError(s.to_string()));
        };

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(ArnError(s.to_string()));
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Resource kind and id, e.g. `("task", "task-0123")` for `task/task-0123`.
    pub fn resource_parts(&self) -> Option<(&str, &str)> {
        self.resource.split_once('/')
    }

    /// The last `/` segment of the resource.
    pub fn resource_name(&self) -> &str {
        self.resource.rsplit('/').next().unwrap_or(&self.resource)
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

/// Short task id used as the mover's callable moniker.
pub fn task_moniker(task_arn: &str) -> Result<String, ArnError> {
    let arn = Arn::parse(task_arn)?;
    match arn.resource_parts() {
        Some((_, id)) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ArnError(task_arn.to_string())),
    }
}

/// Whether an ARN names a DataSync task (the tag index also returns locations).
pub fn is_task_arn(arn: &Arn) -> bool {
    matches!(arn.resource_parts(), Some(("task", _)))
}

/// Run id of a task execution: the last path segment of its ARN.
pub fn execution_id(execution_arn: &str) -> &str {
    execution_arn.rsplit('/').next().unwrap_or(execution_arn)
}

/// Full ARN of a task execution.
pub fn execution_arn(task_arn: &str, run_id: &str) -> String {
    format!("{task_arn}/execution/{run_id}")
}

/// Role name from a role ARN such as `arn:aws:iam::123:role/spinup/org/g/name`.
pub fn role_name_from_arn(role_arn: &str) -> Result<String, ArnError> {
    let arn = Arn::parse(role_arn)?;
    match arn.resource_parts() {
        Some(("role", _)) => Ok(arn.resource_name().to_string()),
        _ => Err(ArnError(role_arn.to_string())),
    }
}
