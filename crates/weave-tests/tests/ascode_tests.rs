//! As-code operation tests.
//!
//! Run with: `cargo test -p weave-tests --test ascode_tests`

use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::time::Duration;
use weave_core::Error;
use weave_core::ascode::{OperationKind, OperationStatus};
use weave_core::events::Event;
use weave_core::ports::{EventBus, WorkflowRepository};
use weave_core::variables::CallerIdentity;
use weave_tests::{DocumentFixture, ProjectFixture, TestContext, wait_for};

const WAIT: Duration = Duration::from_secs(2);

async fn migrated_context() -> TestContext {
    let ctx = TestContext::with_project(ProjectFixture::with_repository()).await;
    ctx.import(&DocumentFixture::scenario_a()).await.unwrap();

    let operation = ctx
        .ascode
        .migrate(&ctx.project, "test_1", "main", "Export test_1", &CallerIdentity::user("alice"))
        .await
        .unwrap();
    ctx.tracker.wait(operation.id).await.unwrap();

    let linked = &ctx;
    wait_for(WAIT, || async move {
        linked.stored("test_1").await.filter(|w| w.is_as_code())
    })
    .await
    .unwrap();
    ctx
}

#[tokio::test]
async fn test_migrate_links_workflow() {
    let ctx = migrated_context().await;

    let stored = ctx.stored("test_1").await.unwrap();
    assert_eq!(
        stored.from_repository.as_deref(),
        Some("https://git.example.com/weave/workflows")
    );

    let requests = ctx.git.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, OperationKind::Migrate);
    assert_eq!(requests[0].repository, "weave/workflows");
    assert_eq!(requests[0].requested_by, "alice");

    // The migration export carries the inherited ACL
    assert_eq!(requests[0].payload.permissions.as_ref().map(Vec::len), Some(3));
    assert_eq!(requests[0].payload.workflow.len(), stored.graph.len());
}

#[tokio::test]
async fn test_push_update_sends_canonical_export() {
    let ctx = migrated_context().await;

    let operation = ctx
        .ascode
        .push_update(
            &ctx.project,
            "test_1",
            &DocumentFixture::scenario_b(),
            "feature/join-2",
            "Converge dev deploys",
            &CallerIdentity::user("alice"),
        )
        .await
        .unwrap();
    assert_eq!(operation.status, OperationStatus::Pending);

    let done = ctx.tracker.wait(operation.id).await.unwrap();
    assert_eq!(done.status, OperationStatus::Done);
    assert!(done.outcome.unwrap().pull_request_url.is_some());

    let requests = ctx.git.requests().await;
    let update = requests.last().unwrap();
    assert_eq!(update.kind, OperationKind::Update);
    assert_eq!(update.branch, "feature/join-2");
    let declared: Vec<&str> = update.payload.workflow.iter().map(|(n, _)| n.as_str()).collect();
    assert!(declared.contains(&"join_2"));
    // No explicit block in the document, so none in the export
    assert!(update.payload.permissions.is_none());
}

#[tokio::test]
async fn test_push_update_returns_while_push_in_flight() {
    let ctx = migrated_context().await;
    ctx.git.hold_pushes();

    let operation = tokio::time::timeout(
        WAIT,
        ctx.ascode.push_update(
            &ctx.project,
            "test_1",
            &DocumentFixture::scenario_b(),
            "feature/join-2",
            "Converge dev deploys",
            &CallerIdentity::user("alice"),
        ),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(operation.status, OperationStatus::Pending);

    // The push has reached git but is not finished
    let git = &ctx.git;
    wait_for(WAIT, || async move { (git.requests().await.len() == 2).then_some(()) })
        .await
        .unwrap();
    let polled = ctx.ascode.operation(operation.id).await.unwrap();
    assert!(!polled.status.is_terminal());

    ctx.git.release_pushes();
    let done = ctx.tracker.wait(operation.id).await.unwrap();
    assert_eq!(done.status, OperationStatus::Done);
}

#[tokio::test]
async fn test_migrate_links_only_after_push_finishes() {
    let ctx = TestContext::with_project(ProjectFixture::with_repository()).await;
    ctx.import(&DocumentFixture::scenario_a()).await.unwrap();
    ctx.git.hold_pushes();

    let operation = tokio::time::timeout(
        WAIT,
        ctx.ascode
            .migrate(&ctx.project, "test_1", "main", "Export test_1", &CallerIdentity::user("alice")),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(operation.status, OperationStatus::Pending);

    let git = &ctx.git;
    wait_for(WAIT, || async move { (!git.requests().await.is_empty()).then_some(()) })
        .await
        .unwrap();
    assert!(!ctx.stored("test_1").await.unwrap().is_as_code());

    ctx.git.release_pushes();
    ctx.tracker.wait(operation.id).await.unwrap();
    let linked = &ctx;
    wait_for(WAIT, || async move {
        linked.stored("test_1").await.filter(|w| w.is_as_code())
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_push_update_refuses_non_as_code_workflow() {
    let ctx = TestContext::with_project(ProjectFixture::with_repository()).await;
    ctx.import(&DocumentFixture::scenario_a()).await.unwrap();

    let err = ctx
        .ascode
        .push_update(
            &ctx.project,
            "test_1",
            &DocumentFixture::scenario_a(),
            "main",
            "update",
            &CallerIdentity::user("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(ctx.git.requests().await.is_empty());
}

#[tokio::test]
async fn test_push_update_refuses_template_workflow() {
    let ctx = migrated_context().await;

    let mut stored = ctx.stored("test_1").await.unwrap();
    let revision = stored.revision;
    stored.template = Some("microservices".to_string());
    ctx.repository.replace(stored, Some(revision)).await.unwrap();

    let err = ctx
        .ascode
        .push_update(
            &ctx.project,
            "test_1",
            &DocumentFixture::scenario_a(),
            "main",
            "update",
            &CallerIdentity::user("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_invalid_update_never_dispatched() {
    let ctx = migrated_context().await;

    let err = ctx
        .ascode
        .push_update(
            &ctx.project,
            "test_1",
            &DocumentFixture::unknown_predecessor(),
            "main",
            "update",
            &CallerIdentity::user("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedInput { .. }));
    assert_eq!(ctx.git.requests().await.len(), 1);
}

#[tokio::test]
async fn test_failed_migration_leaves_workflow_unlinked() {
    let ctx = TestContext::with_project(ProjectFixture::with_repository()).await;
    ctx.import(&DocumentFixture::scenario_a()).await.unwrap();
    ctx.git.fail_pushes();

    let mut failures = ctx.events.subscribe("ascode.failed.>").await.unwrap();
    let operation = ctx
        .ascode
        .migrate(&ctx.project, "test_1", "main", "Export", &CallerIdentity::user("alice"))
        .await
        .unwrap();

    let finished = ctx.tracker.wait(operation.id).await.unwrap();
    assert_eq!(finished.status, OperationStatus::Error);
    assert!(finished.error.unwrap().contains("rejected"));

    let event = tokio::time::timeout(WAIT, failures.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(event, Event::AsCodeOperationFailed(p) if p.operation_id == operation.id));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!ctx.stored("test_1").await.unwrap().is_as_code());
}

#[tokio::test]
async fn test_queued_event_published() {
    let ctx = TestContext::with_project(ProjectFixture::with_repository()).await;
    ctx.import(&DocumentFixture::single("test_1")).await.unwrap();
    let mut queued = ctx.events.subscribe("ascode.queued.*").await.unwrap();

    let operation = ctx
        .ascode
        .migrate(&ctx.project, "test_1", "main", "Export", &CallerIdentity::user("alice"))
        .await
        .unwrap();

    let event = tokio::time::timeout(WAIT, queued.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event.subject(), format!("ascode.queued.{}", operation.id));

    let polled = ctx.ascode.operation(operation.id).await.unwrap();
    assert_eq!(polled.kind, OperationKind::Migrate);
}
