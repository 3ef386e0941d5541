//! Mover creation against the in-memory cloud
//!
//! Covers the happy path, input validation, retry of location creation and
//! rollback after partial failure or shutdown.

mod support;

use datamover_common::defaults::{BUCKET_ACCESS_POLICY_NAME, role_path};
use datamover_common::policy::bucket_access_policy;
use datamover_common::tags::{TAG_GROUP, TAG_ORG};
use datamover_common::{
    ErrorKind, LocationInput, LocationType, MoverCreateRequest, MoverError, PolicyDocument,
    TaskState, Tags,
};
use datamover_orchestrator::aws::{CloudOp, Failure};
use datamover_orchestrator::orchestrator::ensure_role;
use datamover_orchestrator::{RetryPolicy, SqliteTaskStore};
use datamover_test_utils::{bucket_arn, mover_name, s3_location, s3_request};
use std::sync::Arc;
use std::time::Duration;
use support::*;

fn role_name(mover: &str, bucket: &str) -> String {
    format!("{mover}-{bucket}")
}

#[tokio::test]
async fn test_create_provisions_every_resource() {
    let h = Harness::new();
    let name = mover_name();

    let task = h.provision(GROUP, &name).await;

    let events = messages(&task);
    assert_eq!(events.len(), 4, "unexpected events: {events:?}");
    assert_eq!(events[0], "requested creation of source location");
    assert_eq!(events[1], "requested creation of destination location");
    assert_eq!(events[2], format!("requested creation of datasync task {name}"));
    assert!(events[3].starts_with(&format!("created data mover '{name}': task-")));
    assert!(task.failure.is_none());

    let mut roles = h.cloud.role_names().await;
    roles.sort();
    let mut expected = vec![
        role_name(&name, DESTINATION_BUCKET),
        role_name(&name, SOURCE_BUCKET),
    ];
    expected.sort();
    assert_eq!(roles, expected);
    assert_eq!(h.cloud.location_arns().await.len(), 2);
    assert_eq!(h.cloud.task_arns().await.len(), 1);

    let source_role = role_name(&name, SOURCE_BUCKET);
    let policy = h
        .cloud
        .role_policy(&source_role, BUCKET_ACCESS_POLICY_NAME)
        .await
        .expect("bucket access policy attached");
    let policy = PolicyDocument::from_json(&policy).unwrap();
    assert!(policy.equivalent(&bucket_access_policy(&bucket_arn(SOURCE_BUCKET))));

    let role_tags = Tags::from(h.cloud.role_tags(&source_role).await);
    assert!(role_tags.in_org(ORG));
    assert!(role_tags.in_group(GROUP));
}

#[tokio::test]
async fn test_identity_tags_cannot_be_overridden() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;

    let mover = h.orchestrator.describe(GROUP, &name).await.unwrap();
    assert_eq!(mover.tags.get(TAG_ORG), Some(ORG));
    assert_eq!(mover.tags.get(TAG_GROUP), Some(GROUP));
    assert_eq!(mover.tags.get("Project"), Some("archive"));
    assert_eq!(
        mover.tags.iter().filter(|t| t.key == TAG_ORG).count(),
        1,
        "caller-supplied org tag must be dropped"
    );
}

#[tokio::test]
async fn test_invalid_request_has_no_side_effects() {
    let h = Harness::new();

    let mut bad_name = s3_request("not a valid name!", SOURCE_BUCKET, DESTINATION_BUCKET);
    let err = h.orchestrator.create(GROUP, bad_name.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.message().contains("Name doesn't match regex"));

    bad_name.name = None;
    let err = h.orchestrator.create(GROUP, bad_name).await.unwrap_err();
    assert_eq!(err, MoverError::bad_request("Name is a required field"));

    let mut no_destination = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
    no_destination.destination = None;
    let err = h.orchestrator.create(GROUP, no_destination).await.unwrap_err();
    assert_eq!(err, MoverError::bad_request("Source and Destination are required"));

    let request = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
    let err = h.orchestrator.create("", request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    h.orchestrator.wait_for_background().await;
    for op in [CloudOp::GetRole, CloudOp::CreateRole, CloudOp::CreateLocationS3] {
        assert_eq!(h.cloud.calls(op).await, 0, "{op} called");
    }
}

#[tokio::test]
async fn test_destination_failure_rolls_back_source() {
    let h = Harness::new();
    h.cloud
        .inject(
            Failure::new(
                CloudOp::CreateLocationS3,
                MoverError::bad_request("InvalidRequestException: bucket does not exist"),
            )
            .matching(DESTINATION_BUCKET),
        )
        .await;

    let name = mover_name();
    let request = s3_request(&name, SOURCE_BUCKET, DESTINATION_BUCKET);
    let task = h.create_and_wait(GROUP, request).await;

    assert_eq!(task.state, TaskState::Failed);
    let failure = task.failure.as_deref().unwrap();
    assert!(failure.contains("failed to create destination location"), "{failure}");
    assert!(failure.contains("bucket does not exist"), "{failure}");

    // One source attempt plus every destination attempt.
    assert_eq!(h.cloud.calls(CloudOp::CreateLocationS3).await, 1 + 3);
    assert_eq!(h.cloud.calls(CloudOp::CreateTask).await, 0);
    assert_eq!(h.cloud.calls(CloudOp::DeleteLocation).await, 1);

    assert!(h.cloud.location_arns().await.is_empty());
    assert!(h.cloud.role_names().await.is_empty());
    assert!(h.orchestrator.list(GROUP).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_failure_rolls_back_both_locations() {
    let h = Harness::new();
    h.cloud
        .inject(Failure::new(
            CloudOp::CreateTask,
            MoverError::LimitExceeded("LimitExceededException: too many tasks".into()),
        ))
        .await;

    let request = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
    let task = h.create_and_wait(GROUP, request).await;

    assert_eq!(task.state, TaskState::Failed);
    let failure = task.failure.as_deref().unwrap();
    assert!(failure.contains("failed to create datasync task"), "{failure}");

    let events = messages(&task);
    assert!(events.contains(&"rolling back 2 provisioning steps"), "{events:?}");

    assert_eq!(h.cloud.calls(CloudOp::DeleteLocation).await, 2);
    assert_eq!(h.cloud.calls(CloudOp::DeleteRole).await, 2);
    assert!(h.cloud.location_arns().await.is_empty());
    assert!(h.cloud.role_names().await.is_empty());
    assert!(h.cloud.task_arns().await.is_empty());
}

#[tokio::test]
async fn test_location_creation_retries_until_role_visible() {
    let h = Harness::new();
    h.cloud
        .inject(
            Failure::new(
                CloudOp::CreateLocationS3,
                MoverError::bad_request("InvalidRequestException: unable to assume role"),
            )
            .times(2),
        )
        .await;

    let name = mover_name();
    h.provision(GROUP, &name).await;

    // Two failures, then one success per side.
    assert_eq!(h.cloud.calls(CloudOp::CreateLocationS3).await, 4);
    assert_eq!(h.cloud.calls(CloudOp::CreateRole).await, 2);
    assert_eq!(h.cloud.location_arns().await.len(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_remove_only_new_roles() {
    let h = Harness::new();
    let name = mover_name();
    let tags = Tags::identity(ORG, GROUP);

    // The source role already exists and must survive.
    let existing = role_name(&name, SOURCE_BUCKET);
    ensure_role(
        h.cloud.as_ref(),
        &role_path(ORG, GROUP),
        &existing,
        &bucket_arn(SOURCE_BUCKET),
        &tags,
    )
    .await
    .unwrap();

    h.cloud
        .inject(
            Failure::new(
                CloudOp::CreateLocationS3,
                MoverError::bad_request("InvalidRequestException: denied"),
            )
            .matching(SOURCE_BUCKET),
        )
        .await;

    let request = s3_request(&name, SOURCE_BUCKET, DESTINATION_BUCKET);
    let task = h.create_and_wait(GROUP, request).await;

    assert_eq!(task.state, TaskState::Failed);
    assert!(
        task.failure
            .as_deref()
            .unwrap()
            .contains("failed to create source location")
    );
    assert_eq!(h.cloud.role_names().await, vec![existing]);
    assert_eq!(h.cloud.calls(CloudOp::DeleteRole).await, 0);
}

#[tokio::test]
async fn test_ensure_role_is_idempotent() {
    let h = Harness::new();
    let tags = Tags::identity(ORG, GROUP);
    let path = role_path(ORG, GROUP);
    let bucket = bucket_arn(SOURCE_BUCKET);

    let first = ensure_role(h.cloud.as_ref(), &path, "m-src", &bucket, &tags)
        .await
        .unwrap();
    let second = ensure_role(h.cloud.as_ref(), &path, "m-src", &bucket, &tags)
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.arn, second.arn);
    assert_eq!(h.cloud.calls(CloudOp::CreateRole).await, 1);
    assert_eq!(h.cloud.calls(CloudOp::PutRolePolicy).await, 1);

    // A drifted policy is overwritten in place.
    let drifted = bucket_access_policy(&bucket_arn("elsewhere")).to_json().unwrap();
    h.cloud
        .set_role_policy("m-src", BUCKET_ACCESS_POLICY_NAME, &drifted)
        .await;
    ensure_role(h.cloud.as_ref(), &path, "m-src", &bucket, &tags)
        .await
        .unwrap();

    assert_eq!(h.cloud.calls(CloudOp::CreateRole).await, 1);
    assert_eq!(h.cloud.calls(CloudOp::PutRolePolicy).await, 2);
    let current = h
        .cloud
        .role_policy("m-src", BUCKET_ACCESS_POLICY_NAME)
        .await
        .unwrap();
    assert!(
        PolicyDocument::from_json(&current)
            .unwrap()
            .equivalent(&bucket_access_policy(&bucket))
    );
}

#[tokio::test]
async fn test_non_s3_location_fails_task() {
    let h = Harness::new();
    let request = MoverCreateRequest {
        name: Some(mover_name()),
        source: Some(LocationInput {
            kind: LocationType::Efs.to_string(),
            s3: None,
        }),
        destination: Some(s3_location(DESTINATION_BUCKET)),
        tags: Tags::new(),
    };

    let task = h.create_and_wait(GROUP, request).await;
    assert_eq!(task.state, TaskState::Failed);
    let failure = task.failure.as_deref().unwrap();
    assert!(failure.contains("failed to create source location"), "{failure}");
    assert!(failure.contains("invalid location type EFS"), "{failure}");
    assert_eq!(h.cloud.calls(CloudOp::CreateRole).await, 0);
}

#[tokio::test]
async fn test_shutdown_rolls_back_in_flight_create() {
    let h = Harness::with_retry(RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(60)));
    h.cloud
        .inject(
            Failure::new(
                CloudOp::CreateLocationS3,
                MoverError::bad_request("InvalidRequestException: unable to assume role"),
            )
            .matching(DESTINATION_BUCKET),
        )
        .await;

    let request = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
    let task = h.orchestrator.create(GROUP, request).await.unwrap();

    // Source done, destination waiting out its first retry delay.
    let cloud = h.cloud.clone();
    eventually(|| {
        let cloud = cloud.clone();
        async move { cloud.calls(CloudOp::CreateLocationS3).await >= 2 }
    })
    .await;

    tokio::time::timeout(Duration::from_secs(10), h.orchestrator.shutdown())
        .await
        .expect("shutdown does not wait for the retry delay");

    let task = h.orchestrator.task_status(&task.id).await.unwrap();
    assert_eq!(task.state, TaskState::Failed);
    let failure = task.failure.as_deref().unwrap();
    assert!(failure.contains("process shutting down"), "{failure}");
    assert!(h.cloud.location_arns().await.is_empty());
    assert!(h.cloud.role_names().await.is_empty());
}

#[tokio::test]
async fn test_create_tracked_in_sqlite_store() {
    let store = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
    let h = Harness::with_store(store);

    let task = h.provision(GROUP, &mover_name()).await;
    assert_eq!(messages(&task).len(), 4);
    assert!(task.checked_in_at.is_some());
}

#[tokio::test]
async fn test_unknown_task_status() {
    let h = Harness::new();
    let err = h.orchestrator.task_status("no-such-task").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_task_visible_immediately_after_create() {
    let h = Harness::new();
    let request = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
    let task = h.orchestrator.create(GROUP, request).await.unwrap();
    assert_eq!(task.state, TaskState::Created);

    let polled = h.orchestrator.task_status(&task.id).await.unwrap();
    assert!(
        matches!(polled.state, TaskState::Created | TaskState::Running),
        "{polled:?}"
    );

    h.orchestrator.wait_for_background().await;
    let done = h.orchestrator.task_status(&task.id).await.unwrap();
    assert_eq!(done.state, TaskState::Complete);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_task_visible_immediately_on_multi_thread_runtime() {
    let h = Harness::new();
    for _ in 0..50 {
        let request = s3_request(&mover_name(), SOURCE_BUCKET, DESTINATION_BUCKET);
        let task = h.orchestrator.create(GROUP, request).await.unwrap();
        let polled = h.orchestrator.task_status(&task.id).await;
        assert!(polled.is_ok(), "task {} not visible: {polled:?}", task.id);
    }
    h.orchestrator.wait_for_background().await;
    assert_eq!(h.cloud.task_arns().await.len(), 50);
}

#[tokio::test]
async fn test_provisions_while_task_store_is_down() {
    let h = Harness::with_store(Arc::new(UnavailableStore));
    let name = mover_name();

    let task = tokio::time::timeout(
        Duration::from_secs(10),
        h.orchestrator
            .create(GROUP, s3_request(&name, SOURCE_BUCKET, DESTINATION_BUCKET)),
    )
    .await
    .expect("create returns")
    .expect("create accepted");
    tokio::time::timeout(Duration::from_secs(10), h.orchestrator.wait_for_background())
        .await
        .expect("background work finishes");

    assert_eq!(h.cloud.location_arns().await.len(), 2);
    assert_eq!(h.cloud.task_arns().await.len(), 1);
    assert_eq!(h.cloud.role_names().await.len(), 2);
    assert_eq!(h.orchestrator.list(GROUP).await.unwrap(), vec![name]);

    let err = h.orchestrator.task_status(&task.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_recreate_after_rolled_back_failure() {
    let h = Harness::new();
    h.cloud
        .inject(Failure::new(
            CloudOp::CreateTask,
            MoverError::ServiceUnavailable("ServiceUnavailable: try later".into()),
        ))
        .await;

    let name = mover_name();
    let request = s3_request(&name, SOURCE_BUCKET, DESTINATION_BUCKET);
    let failed = h.create_and_wait(GROUP, request).await;
    assert_eq!(failed.state, TaskState::Failed);
    assert!(h.cloud.role_names().await.is_empty());

    h.cloud.clear_failures().await;
    h.provision(GROUP, &name).await;
    assert_eq!(h.orchestrator.list(GROUP).await.unwrap(), vec![name]);
    assert_eq!(h.cloud.calls(CloudOp::CreateRole).await, 4);
}
