//! In-memory cloud backend
//!
//! `MemoryCloud` implements the role store, transfer service and tag index
//! over process memory. It backs `--backend memory` dry runs and the test
//! suite, and records how often each operation was called. Failures can be
//! injected per operation, optionally only for calls whose target contains a
//! given substring, and cleared again.

use async_trait::async_trait;
use datamover_common::location::LocationType;
use datamover_common::model::{
    EfsLocationDetails, LocationDescription, MoverRun, NfsLocationDetails, S3LocationDetails,
    SmbLocationDetails,
};
use datamover_common::tags::TagFilter;
use datamover_common::{Arn, MoverError, Result, Tag, Tags, TransferTask, TransferTaskStatus};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::datasync::{CreateS3LocationInput, CreateTaskInput, TransferService};
use super::iam::{CreateRoleInput, Role, RoleStore};
use super::tagging::{TagIndex, TaggedResource};

const DEFAULT_ACCOUNT: &str = "012345678901";
const DEFAULT_REGION: &str = "us-east-1";

/// Operations exposed by the in-memory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CloudOp {
    GetRole,
    CreateRole,
    GetRolePolicy,
    PutRolePolicy,
    TagRole,
    ListRolePolicies,
    DeleteRolePolicy,
    DeleteRole,
    CreateLocationS3,
    DeleteLocation,
    DescribeLocation,
    ListLocations,
    CreateTask,
    DeleteTask,
    DescribeTask,
    ListTaskExecutions,
    DescribeTaskExecution,
    StartTaskExecution,
    CancelTaskExecution,
    GetResources,
}

/// A failure to inject into the backend.
#[derive(Debug, Clone)]
pub struct Failure {
    op: CloudOp,
    matching: Option<String>,
    remaining: Option<usize>,
    error: MoverError,
}

impl Failure {
    /// Fail every call of `op` with `error`.
    pub fn new(op: CloudOp, error: MoverError) -> Self {
        Self {
            op,
            matching: None,
            remaining: None,
            error,
        }
    }

    /// Only fail calls whose target contains `needle`.
    pub fn matching(mut self, needle: impl Into<String>) -> Self {
        self.matching = Some(needle.into());
        self
    }

    /// Only fail the next `n` matching calls.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }
}

#[derive(Debug)]
struct StoredRole {
    role: Role,
    policies: BTreeMap<String, String>,
    tags: Vec<Tag>,
}

#[derive(Debug)]
struct StoredLocation {
    description: LocationDescription,
    tags: Tags,
}

#[derive(Debug)]
struct StoredTask {
    task: TransferTask,
    tags: Tags,
    executions: Vec<(String, MoverRun)>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    calls: HashMap<CloudOp, usize>,
    failures: Vec<Failure>,
    roles: BTreeMap<String, StoredRole>,
    locations: BTreeMap<String, StoredLocation>,
    tasks: BTreeMap<String, StoredTask>,
}

impl State {
    fn record(&mut self, op: CloudOp, target: &str) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;

        let hit = self.failures.iter().position(|f| {
            f.op == op
                && f.remaining != Some(0)
                && f.matching.as_deref().is_none_or(|n| target.contains(n))
        });
        let Some(idx) = hit else {
            return Ok(());
        };

        let failure = &mut self.failures[idx];
        if let Some(n) = failure.remaining.as_mut() {
            *n -= 1;
        }
        Err(failure.error.clone())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:017x}", self.next_id)
    }
}

/// In-memory implementation of every cloud collaborator.
#[derive(Debug)]
pub struct MemoryCloud {
    account: String,
    region: String,
    state: Mutex<State>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            region: DEFAULT_REGION.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Register a failure for subsequent calls.
    pub async fn inject(&self, failure: Failure) {
        self.state.lock().await.failures.push(failure);
    }

    /// Drop every injected failure.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Number of times `op` has been called.
    pub async fn calls(&self, op: CloudOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or_default()
    }

    pub async fn role_names(&self) -> Vec<String> {
        self.state.lock().await.roles.keys().cloned().collect()
    }

    pub async fn role_policy(&self, role_name: &str, policy_name: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.roles.get(role_name)?.policies.get(policy_name).cloned()
    }

    pub async fn role_tags(&self, role_name: &str) -> Vec<Tag> {
        let state = self.state.lock().await;
        state
            .roles
            .get(role_name)
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    pub async fn location_arns(&self) -> Vec<String> {
        self.state.lock().await.locations.keys().cloned().collect()
    }

    pub async fn task_arns(&self) -> Vec<String> {
        self.state.lock().await.tasks.keys().cloned().collect()
    }

    /// Overwrite an inline policy without recording a call.
    pub async fn set_role_policy(&self, role_name: &str, policy_name: &str, document: &str) {
        let mut state = self.state.lock().await;
        if let Some(role) = state.roles.get_mut(role_name) {
            role.policies
                .insert(policy_name.to_string(), document.to_string());
        }
    }

    /// Add a location that was created out-of-band, returning its ARN.
    pub async fn insert_location(&self, kind: LocationType, uri: &str, tags: Tags) -> String {
        let mut state = self.state.lock().await;
        let arn = self.location_arn(&state.next_id("loc"));
        let location_arn = arn.clone();
        let location_uri = uri.to_string();
        let description = match kind {
            LocationType::S3 => LocationDescription::S3(S3LocationDetails {
                location_arn,
                location_uri,
                s3_storage_class: None,
                bucket_access_role_arn: None,
                creation_time: None,
            }),
            LocationType::Efs => LocationDescription::Efs(EfsLocationDetails {
                location_arn,
                location_uri,
                creation_time: None,
            }),
            LocationType::Smb => LocationDescription::Smb(SmbLocationDetails {
                location_arn,
                location_uri,
                user: None,
                domain: None,
                agent_arns: Vec::new(),
                creation_time: None,
            }),
            LocationType::Nfs => LocationDescription::Nfs(NfsLocationDetails {
                location_arn,
                location_uri,
                agent_arns: Vec::new(),
                creation_time: None,
            }),
        };
        state
            .locations
            .insert(arn.clone(), StoredLocation { description, tags });
        arn
    }

    /// Force a task's status, e.g. to simulate a run started elsewhere.
    pub async fn set_task_status(&self, task_arn: &str, status: TransferTaskStatus) {
        let mut state = self.state.lock().await;
        if let Some(stored) = state.tasks.get_mut(task_arn) {
            stored.task.status = status;
        }
    }

    fn location_arn(&self, id: &str) -> String {
        format!(
            "arn:aws:datasync:{}:{}:location/{id}",
            self.region, self.account
        )
    }

    fn task_arn(&self, id: &str) -> String {
        format!("arn:aws:datasync:{}:{}:task/{id}", self.region, self.account)
    }

    fn role_arn(&self, path: &str, name: &str) -> String {
        format!("arn:aws:iam::{}:role{path}{name}", self.account)
    }
}

fn no_role(role_name: &str) -> MoverError {
    MoverError::not_found(format!("NoSuchEntity: role {role_name}"))
}

fn invalid(msg: String) -> MoverError {
    MoverError::bad_request(format!("InvalidRequestException: {msg}"))
}

#[async_trait]
impl RoleStore for MemoryCloud {
    async fn get_role(&self, role_name: &str) -> Result<Role> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::GetRole, role_name)?;
        state
            .roles
            .get(role_name)
            .map(|r| r.role.clone())
            .ok_or_else(|| no_role(role_name))
    }

    async fn create_role(&self, input: CreateRoleInput) -> Result<Role> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::CreateRole, &input.name)?;
        if state.roles.contains_key(&input.name) {
            return Err(MoverError::conflict(format!(
                "EntityAlreadyExists: role {}",
                input.name
            )));
        }

        let role = Role {
            arn: self.role_arn(&input.path, &input.name),
            name: input.name.clone(),
            path: input.path,
        };
        state.roles.insert(
            input.name,
            StoredRole {
                role: role.clone(),
                policies: BTreeMap::new(),
                tags: Vec::new(),
            },
        );
        Ok(role)
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::GetRolePolicy, role_name)?;
        let role = state.roles.get(role_name).ok_or_else(|| no_role(role_name))?;
        role.policies.get(policy_name).cloned().ok_or_else(|| {
            MoverError::not_found(format!("NoSuchEntity: policy {policy_name} on {role_name}"))
        })
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::PutRolePolicy, role_name)?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| no_role(role_name))?;
        role.policies
            .insert(policy_name.to_string(), document.to_string());
        Ok(())
    }

    async fn tag_role(&self, role_name: &str, tags: &[Tag]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::TagRole, role_name)?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| no_role(role_name))?;
        for tag in tags {
            role.tags.retain(|t| t.key != tag.key);
            role.tags.push(tag.clone());
        }
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::ListRolePolicies, role_name)?;
        let role = state.roles.get(role_name).ok_or_else(|| no_role(role_name))?;
        Ok(role.policies.keys().cloned().collect())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DeleteRolePolicy, role_name)?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| no_role(role_name))?;
        role.policies
            .remove(policy_name)
            .map(|_| ())
            .ok_or_else(|| MoverError::not_found(format!("NoSuchEntity: policy {policy_name}")))
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DeleteRole, role_name)?;
        let role = state.roles.get(role_name).ok_or_else(|| no_role(role_name))?;
        if !role.policies.is_empty() {
            return Err(MoverError::conflict(format!(
                "DeleteConflict: role {role_name} still has inline policies"
            )));
        }
        state.roles.remove(role_name);
        Ok(())
    }
}

#[async_trait]
impl TransferService for MemoryCloud {
    async fn create_location_s3(&self, input: CreateS3LocationInput) -> Result<String> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::CreateLocationS3, &input.bucket_arn)?;

        let bucket = Arn::parse(&input.bucket_arn)
            .map_err(|e| invalid(e.to_string()))?
            .resource;
        let role_visible = state
            .roles
            .values()
            .any(|r| r.role.arn == input.bucket_access_role_arn);
        if !role_visible {
            return Err(invalid(format!(
                "unable to assume role {}",
                input.bucket_access_role_arn
            )));
        }

        let arn = self.location_arn(&state.next_id("loc"));
        let subdirectory = input.subdirectory.as_deref().unwrap_or("/");
        let description = LocationDescription::S3(S3LocationDetails {
            location_arn: arn.clone(),
            location_uri: format!("s3://{bucket}{subdirectory}"),
            s3_storage_class: input.storage_class,
            bucket_access_role_arn: Some(input.bucket_access_role_arn),
            creation_time: Some(chrono::Utc::now()),
        });
        state.locations.insert(
            arn.clone(),
            StoredLocation {
                description,
                tags: input.tags,
            },
        );
        Ok(arn)
    }

    async fn delete_location(&self, location_arn: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DeleteLocation, location_arn)?;
        state
            .locations
            .remove(location_arn)
            .map(|_| ())
            .ok_or_else(|| MoverError::not_found(format!("location {location_arn}")))
    }

    async fn describe_location_s3(&self, location_arn: &str) -> Result<S3LocationDetails> {
        match describe(self, location_arn).await? {
            LocationDescription::S3(details) => Ok(details),
            other => Err(wrong_type(location_arn, other.location_type())),
        }
    }

    async fn describe_location_efs(&self, location_arn: &str) -> Result<EfsLocationDetails> {
        match describe(self, location_arn).await? {
            LocationDescription::Efs(details) => Ok(details),
            other => Err(wrong_type(location_arn, other.location_type())),
        }
    }

    async fn describe_location_smb(&self, location_arn: &str) -> Result<SmbLocationDetails> {
        match describe(self, location_arn).await? {
            LocationDescription::Smb(details) => Ok(details),
            other => Err(wrong_type(location_arn, other.location_type())),
        }
    }

    async fn describe_location_nfs(&self, location_arn: &str) -> Result<NfsLocationDetails> {
        match describe(self, location_arn).await? {
            LocationDescription::Nfs(details) => Ok(details),
            other => Err(wrong_type(location_arn, other.location_type())),
        }
    }

    async fn list_locations(&self) -> Result<HashMap<String, LocationType>> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::ListLocations, "")?;
        Ok(state
            .locations
            .iter()
            .map(|(arn, l)| (arn.clone(), l.description.location_type()))
            .collect())
    }

    async fn create_task(&self, input: CreateTaskInput) -> Result<String> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::CreateTask, &input.name)?;

        for arn in [&input.source_location_arn, &input.destination_location_arn] {
            if !state.locations.contains_key(arn) {
                return Err(invalid(format!("location {arn} does not exist")));
            }
        }

        let arn = self.task_arn(&state.next_id("task"));
        let task = TransferTask {
            task_arn: arn.clone(),
            name: Some(input.name),
            status: TransferTaskStatus::Available,
            source_location_arn: input.source_location_arn,
            destination_location_arn: input.destination_location_arn,
            current_task_execution_arn: None,
            creation_time: Some(chrono::Utc::now()),
        };
        state.tasks.insert(
            arn.clone(),
            StoredTask {
                task,
                tags: input.tags,
                executions: Vec::new(),
            },
        );
        Ok(arn)
    }

    async fn delete_task(&self, task_arn: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DeleteTask, task_arn)?;
        state
            .tasks
            .remove(task_arn)
            .map(|_| ())
            .ok_or_else(|| MoverError::not_found(format!("task {task_arn}")))
    }

    async fn describe_task(&self, task_arn: &str) -> Result<TransferTask> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DescribeTask, task_arn)?;
        state
            .tasks
            .get(task_arn)
            .map(|t| t.task.clone())
            .ok_or_else(|| MoverError::not_found(format!("task {task_arn}")))
    }

    async fn list_task_executions(&self, task_arn: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::ListTaskExecutions, task_arn)?;
        let stored = state
            .tasks
            .get(task_arn)
            .ok_or_else(|| MoverError::not_found(format!("task {task_arn}")))?;
        Ok(stored.executions.iter().map(|(arn, _)| arn.clone()).collect())
    }

    async fn describe_task_execution(&self, execution_arn: &str) -> Result<MoverRun> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::DescribeTaskExecution, execution_arn)?;
        state
            .tasks
            .values()
            .flat_map(|t| t.executions.iter())
            .find(|(arn, _)| arn == execution_arn)
            .map(|(_, run)| run.clone())
            .ok_or_else(|| invalid(format!("execution {execution_arn} does not exist")))
    }

    async fn start_task_execution(&self, task_arn: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::StartTaskExecution, task_arn)?;
        let id = state.next_id("exec");
        let stored = state
            .tasks
            .get_mut(task_arn)
            .ok_or_else(|| MoverError::not_found(format!("task {task_arn}")))?;

        let execution_arn = datamover_common::arn::execution_arn(task_arn, &id);
        stored.task.status = TransferTaskStatus::Running;
        stored.task.current_task_execution_arn = Some(execution_arn.clone());
        stored.executions.push((
            execution_arn.clone(),
            MoverRun {
                start_time: Some(chrono::Utc::now()),
                status: Some("LAUNCHING".to_string()),
                ..Default::default()
            },
        ));
        Ok(execution_arn)
    }

    async fn cancel_task_execution(&self, execution_arn: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::CancelTaskExecution, execution_arn)?;
        let stored = state
            .tasks
            .values_mut()
            .find(|t| t.task.current_task_execution_arn.as_deref() == Some(execution_arn))
            .ok_or_else(|| invalid(format!("execution {execution_arn} is not running")))?;

        stored.task.status = TransferTaskStatus::Available;
        stored.task.current_task_execution_arn = None;
        if let Some((_, run)) = stored
            .executions
            .iter_mut()
            .find(|(arn, _)| arn == execution_arn)
        {
            run.status = Some("ERROR".to_string());
        }
        Ok(())
    }
}

async fn describe(cloud: &MemoryCloud, location_arn: &str) -> Result<LocationDescription> {
    let mut state = cloud.state.lock().await;
    state.record(CloudOp::DescribeLocation, location_arn)?;
    state
        .locations
        .get(location_arn)
        .map(|l| l.description.clone())
        .ok_or_else(|| MoverError::not_found(format!("location {location_arn}")))
}

fn wrong_type(location_arn: &str, actual: LocationType) -> MoverError {
    invalid(format!("location {location_arn} is a {actual} location"))
}

fn type_matches(filter: &str, kind: &str) -> bool {
    match filter.split_once(':') {
        Some((service, resource)) => service == "datasync" && resource == kind,
        None => filter == "datasync",
    }
}

#[async_trait]
impl TagIndex for MemoryCloud {
    async fn get_resources(
        &self,
        resource_types: &[&str],
        filters: &[TagFilter],
    ) -> Result<Vec<TaggedResource>> {
        let mut state = self.state.lock().await;
        state.record(CloudOp::GetResources, &resource_types.join(","))?;

        let wants = |kind: &str| resource_types.iter().any(|f| type_matches(f, kind));
        let matches = |tags: &Tags| filters.iter().all(|f| f.matches(tags));

        let tasks = state
            .tasks
            .iter()
            .filter(|_| wants("task"))
            .map(|(arn, t)| (arn, &t.tags));
        let locations = state
            .locations
            .iter()
            .filter(|_| wants("location"))
            .map(|(arn, l)| (arn, &l.tags));

        Ok(tasks
            .chain(locations)
            .filter(|(_, tags)| matches(tags))
            .map(|(arn, tags)| TaggedResource {
                arn: arn.clone(),
                tags: tags.clone(),
            })
            .collect())
    }
}
