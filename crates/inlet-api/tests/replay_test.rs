//! Integration tests for the event replay endpoint.
//!
//! Exercises `/events/{event_id}/replay` against seeded event records:
//! re-enqueueing, missing events, and events whose source no longer has
//! a registered task.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use inlet_api::{create_router, AppState};
use inlet_core::{
    registry::{SourceRegistration, SourceRegistry},
    store::{mock::InMemoryEventStore, EventStore},
    task::{ProcessingTask, TaskOutcome},
    time::TestClock,
    verify::Verifier,
    TaskRef,
};
use inlet_queue::{
    queue::{mock::InMemoryTaskQueue, TaskQueue},
    tasks::GITHUB_TASK,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct NoopTask;

impl ProcessingTask for NoopTask {
    fn task_ref(&self) -> TaskRef {
        TaskRef::new(GITHUB_TASK)
    }

    fn execute(
        &self,
        _payload: Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(async { TaskOutcome::Success })
    }
}

struct TestApp {
    router: axum::Router,
    queue: Arc<InMemoryTaskQueue>,
    store: Arc<InMemoryEventStore>,
}

fn test_app() -> TestApp {
    let clock = Arc::new(TestClock::new());
    let queue = Arc::new(InMemoryTaskQueue::new(clock.clone()));
    let store = Arc::new(InMemoryEventStore::with_clock(clock.clone()));

    let registry = SourceRegistry::build(vec![SourceRegistration::new(
        "github",
        Verifier::HmacSha256 {
            secret: "replay-test-secret".to_string(),
            header: "x-hub-signature-256".to_string(),
        },
        Arc::new(NoopTask),
    )])
    .expect("registry builds");

    let state = AppState {
        registry: Arc::new(registry),
        queue: queue.clone(),
        store: store.clone(),
        clock,
    };

    TestApp { router: create_router(state, Duration::from_secs(5)), queue, store }
}

async fn response_json(response: axum::response::Response) -> Value {
    let body =
        axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read response body");
    serde_json::from_slice(&body).expect("parse response json")
}

#[tokio::test]
async fn replaying_recorded_event_enqueues_fresh_work_item() {
    let app = test_app();
    let payload = json!({
        "action": "opened",
        "sender": {"login": "octocat"},
        "repository": {"full_name": "octocat/hello-world"}
    });
    let record = app
        .store
        .append("github".to_string(), payload.clone())
        .await
        .expect("seed event record");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/events/{}/replay", record.id))
        .body(Body::empty())
        .expect("build request");

    let response = app.router.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = response_json(response).await;
    assert_eq!(
        json["message"],
        format!("Event {} has been re-queued for processing.", record.id)
    );

    assert_eq!(app.queue.pending_count().await, 1);
}

#[tokio::test]
async fn replaying_missing_event_returns_404() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/events/9999/replay")
        .body(Body::empty())
        .expect("build request");

    let response = app.router.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "event_not_found");

    assert_eq!(app.queue.pending_count().await, 0);
}

#[tokio::test]
async fn replaying_event_without_registered_source_returns_400() {
    let app = test_app();
    let record = app
        .store
        .append("bitbucket".to_string(), json!({"kind": "push"}))
        .await
        .expect("seed event record");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/events/{}/replay", record.id))
        .body(Body::empty())
        .expect("build request");

    let response = app.router.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "unknown_task");

    assert_eq!(app.queue.pending_count().await, 0);
}

#[tokio::test]
async fn replayed_payload_matches_the_recorded_event() {
    let app = test_app();
    let payload = json!({
        "action": "closed",
        "sender": {"login": "hubot"},
        "repository": {"full_name": "octocat/hello-world"}
    });
    let record =
        app.store.append("github".to_string(), payload.clone()).await.expect("seed event record");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/events/{}/replay", record.id))
        .body(Body::empty())
        .expect("build request");

    let response = app.router.oneshot(request).await.expect("execute request");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let items = app.queue.claim_pending(10).await.expect("claim pending items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].payload, payload);
    assert_eq!(items[0].task, TaskRef::new(GITHUB_TASK));
    assert_eq!(items[0].attempt_count, 0);
}
