//! Discovery, description, deletion and run control of existing movers

mod support;

use datamover_common::{
    ErrorKind, LocationDescription, LocationType, Tags, TransferTaskStatus,
};
use datamover_orchestrator::aws::{CloudOp, CreateTaskInput, TransferService};
use datamover_test_utils::mover_name;
use support::*;

#[tokio::test]
async fn test_list_by_group_and_org() {
    let h = Harness::new();
    let first = mover_name();
    let second = mover_name();
    let elsewhere = mover_name();
    h.provision(GROUP, &first).await;
    h.provision(GROUP, &second).await;
    h.provision("g2", &elsewhere).await;

    let mut names = h.orchestrator.list(GROUP).await.unwrap();
    names.sort();
    let mut expected = vec![first.clone(), second.clone()];
    expected.sort();
    assert_eq!(names, expected, "locations must not appear as movers");

    assert_eq!(h.orchestrator.list("g2").await.unwrap(), vec![elsewhere]);
    assert_eq!(h.orchestrator.list("").await.unwrap().len(), 3);

    let other_org = h.for_org("globex");
    assert!(other_org.orchestrator.list(GROUP).await.unwrap().is_empty());
    assert!(other_org.orchestrator.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_describe_reports_both_locations() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;

    let mover = h.orchestrator.describe(GROUP, &name).await.unwrap();
    assert_eq!(mover.task.name.as_deref(), Some(name.as_str()));
    assert_eq!(mover.task.status, TransferTaskStatus::Available);

    let Some(LocationDescription::S3(source)) = &mover.source else {
        panic!("source is not S3: {:?}", mover.source);
    };
    assert_eq!(source.location_uri, format!("s3://{SOURCE_BUCKET}/"));
    assert_eq!(source.location_arn, mover.task.source_location_arn);
    assert!(
        source
            .bucket_access_role_arn
            .as_deref()
            .is_some_and(|arn| arn.ends_with(&format!("/{name}-{SOURCE_BUCKET}")))
    );

    let Some(LocationDescription::S3(destination)) = &mover.destination else {
        panic!("destination is not S3: {:?}", mover.destination);
    };
    assert_eq!(destination.location_uri, format!("s3://{DESTINATION_BUCKET}/"));
}

#[tokio::test]
async fn test_describe_mover_created_elsewhere() {
    let h = Harness::new();
    let tags = Tags::identity(ORG, GROUP);
    let source = h
        .cloud
        .insert_location(LocationType::Efs, "efs://us-east-1.fs-0123/data/", tags.clone())
        .await;
    let destination = h
        .cloud
        .insert_location(LocationType::S3, "s3://archive/", tags.clone())
        .await;
    h.cloud
        .create_task(CreateTaskInput {
            name: "legacy".to_string(),
            source_location_arn: source,
            destination_location_arn: destination,
            tags,
        })
        .await
        .unwrap();

    let mover = h.orchestrator.describe(GROUP, "legacy").await.unwrap();
    assert_eq!(
        mover.source.as_ref().map(LocationDescription::location_type),
        Some(LocationType::Efs)
    );
    assert_eq!(
        mover.destination.as_ref().and_then(|d| d.access_role_arn()),
        None
    );
}

#[tokio::test]
async fn test_describe_unknown_mover() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;

    let err = h.orchestrator.describe(GROUP, "nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.message(), "datasync mover not found");

    let err = h.orchestrator.describe("g2", &name).await.unwrap_err();
    assert!(err.is_not_found());

    let err = h.for_org("globex").orchestrator.describe(GROUP, &name).await.unwrap_err();
    assert!(err.is_not_found());

    let err = h.orchestrator.describe(GROUP, "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_delete_removes_every_resource() {
    let h = Harness::new();
    let name = mover_name();
    let keep = mover_name();
    h.provision(GROUP, &name).await;
    h.provision(GROUP, &keep).await;

    h.orchestrator.delete(GROUP, &name).await.unwrap();

    assert_eq!(h.orchestrator.list(GROUP).await.unwrap(), vec![keep.clone()]);
    assert_eq!(h.cloud.task_arns().await.len(), 1);
    assert_eq!(h.cloud.location_arns().await.len(), 2);
    let roles = h.cloud.role_names().await;
    assert_eq!(roles.len(), 2);
    assert!(roles.iter().all(|r| r.starts_with(&keep)), "{roles:?}");

    let err = h.orchestrator.delete(GROUP, &name).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_tolerates_missing_role() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;

    // Out-of-band cleanup of one role must not block deletion.
    let role = format!("{name}-{SOURCE_BUCKET}");
    datamover_orchestrator::orchestrator::delete_access_role(
        h.cloud.as_ref(),
        &format!("arn:aws:iam::012345678901:role/spinup/{ORG}/{GROUP}/{role}"),
    )
    .await
    .unwrap();
    assert_eq!(h.cloud.role_names().await.len(), 1);

    h.orchestrator.delete(GROUP, &name).await.unwrap();
    assert!(h.cloud.role_names().await.is_empty());
    assert!(h.cloud.location_arns().await.is_empty());
}

#[tokio::test]
async fn test_run_lifecycle() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;
    assert!(h.orchestrator.run_list(GROUP, &name).await.unwrap().is_empty());

    let run_id = h.orchestrator.start_run(GROUP, &name).await.unwrap();
    assert!(run_id.starts_with("exec-"), "{run_id}");
    assert_eq!(
        h.orchestrator.run_list(GROUP, &name).await.unwrap(),
        vec![run_id.clone()]
    );

    let run = h
        .orchestrator
        .run_describe(GROUP, &name, &run_id)
        .await
        .unwrap();
    assert_eq!(run.status.as_deref(), Some("LAUNCHING"));
    assert!(run.start_time.is_some());

    let err = h.orchestrator.run_describe(GROUP, &name, "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = h.orchestrator.start_run(GROUP, &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message(), format!("data mover {name} is already running"));
    assert_eq!(h.cloud.calls(CloudOp::StartTaskExecution).await, 1);

    h.orchestrator.stop_run(GROUP, &name).await.unwrap();
    let run = h
        .orchestrator
        .run_describe(GROUP, &name, &run_id)
        .await
        .unwrap();
    assert_eq!(run.status.as_deref(), Some("ERROR"));

    let err = h.orchestrator.stop_run(GROUP, &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message(), format!("data mover {name} is not running"));
    assert_eq!(h.cloud.calls(CloudOp::CancelTaskExecution).await, 1);
}

#[tokio::test]
async fn test_start_refused_while_running_elsewhere() {
    let h = Harness::new();
    let name = mover_name();
    h.provision(GROUP, &name).await;
    let task_arn = h.orchestrator.describe(GROUP, &name).await.unwrap().task.task_arn;

    h.cloud
        .set_task_status(&task_arn, TransferTaskStatus::Running)
        .await;

    let err = h.orchestrator.start_run(GROUP, &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.cloud.calls(CloudOp::StartTaskExecution).await, 0);

    // Running without a current execution cannot be stopped either.
    let err = h.orchestrator.stop_run(GROUP, &name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.cloud.calls(CloudOp::CancelTaskExecution).await, 0);
}

#[tokio::test]
async fn test_run_of_unknown_mover() {
    let h = Harness::new();
    assert!(h.orchestrator.start_run(GROUP, "ghost").await.unwrap_err().is_not_found());
    assert!(h.orchestrator.stop_run(GROUP, "ghost").await.unwrap_err().is_not_found());
    assert!(h.orchestrator.run_list(GROUP, "ghost").await.unwrap_err().is_not_found());
}
