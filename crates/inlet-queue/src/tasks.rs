//! Processing tasks for the registered webhook sources.
//!
//! Each task persists the payload as an event record and runs its
//! source-specific side effects. Shape validation failures are reported
//! as permanent: re-running a malformed payload cannot fix it. Store
//! failures are transient and feed the retry policy.

use std::{future::Future, pin::Pin, sync::Arc};

use inlet_core::{
    models::TaskRef,
    store::EventStore,
    task::{ProcessingTask, TaskOutcome},
    IntakeError,
};
use serde_json::Value;
use tracing::{error, info};

/// Routing key for GitHub webhook processing.
pub const GITHUB_TASK: &str = "process_github_webhook";

/// Routing key for Stripe webhook processing.
pub const STRIPE_TASK: &str = "process_stripe_webhook";

fn store_outcome(result: Result<inlet_core::models::EventRecord, IntakeError>) -> TaskOutcome {
    match result {
        Ok(record) => {
            info!(event_id = %record.id, source = %record.source, "event record persisted");
            TaskOutcome::Success
        },
        Err(err) if err.is_retryable() => {
            error!(error = %err, "event persistence failed, attempt will be retried");
            TaskOutcome::retryable(err.to_string())
        },
        Err(err) => {
            error!(error = %err, "event persistence failed permanently");
            TaskOutcome::permanent(err.to_string())
        },
    }
}

/// Processes GitHub webhook payloads.
///
/// Expects the payload shape GitHub sends for repository events: a JSON
/// object with `sender` and `repository` objects, and an optional
/// `action` string. Payloads missing either object are rejected
/// permanently.
pub struct GithubTask {
    store: Arc<dyn EventStore>,
}

impl GithubTask {
    /// Creates the task over the given event store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

impl ProcessingTask for GithubTask {
    fn task_ref(&self) -> TaskRef {
        TaskRef::from(GITHUB_TASK)
    }

    fn execute(&self, payload: Value) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(async move {
            let Some(sender) = payload.get("sender").filter(|v| v.is_object()) else {
                return TaskOutcome::permanent("payload is missing the 'sender' object");
            };
            let Some(repository) = payload.get("repository").filter(|v| v.is_object()) else {
                return TaskOutcome::permanent("payload is missing the 'repository' object");
            };

            let sender_login = sender.get("login").and_then(Value::as_str).unwrap_or("unknown");
            let repo_name =
                repository.get("full_name").and_then(Value::as_str).unwrap_or("unknown");
            info!(sender = sender_login, repository = repo_name, "processing GitHub event");

            store_outcome(self.store.append("github".into(), payload).await)
        })
    }
}

/// Processes Stripe webhook payloads.
///
/// Stripe events carry a `type` discriminator but no shape is enforced
/// here; every payload that reached the queue is persisted.
pub struct StripeTask {
    store: Arc<dyn EventStore>,
}

impl StripeTask {
    /// Creates the task over the given event store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

impl ProcessingTask for StripeTask {
    fn task_ref(&self) -> TaskRef {
        TaskRef::from(STRIPE_TASK)
    }

    fn execute(&self, payload: Value) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(async move {
            let event_type = payload.get("type").and_then(Value::as_str).unwrap_or("unknown");
            info!(event_type, "processing Stripe event");

            store_outcome(self.store.append("stripe".into(), payload).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use inlet_core::store::mock::InMemoryEventStore;
    use serde_json::json;

    use super::*;

    fn github_payload() -> Value {
        json!({
            "action": "opened",
            "sender": {"login": "octocat"},
            "repository": {"full_name": "octocat/hello-world"}
        })
    }

    #[tokio::test]
    async fn github_task_persists_valid_payload() {
        let store = Arc::new(InMemoryEventStore::new());
        let task = GithubTask::new(store.clone());

        let outcome = task.execute(github_payload()).await;

        assert!(outcome.is_success());
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn github_task_rejects_missing_sender() {
        let store = Arc::new(InMemoryEventStore::new());
        let task = GithubTask::new(store.clone());

        let outcome = task
            .execute(json!({"repository": {"full_name": "octocat/hello-world"}}))
            .await;

        assert!(matches!(outcome, TaskOutcome::PermanentFailure { .. }));
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn github_task_rejects_non_object_repository() {
        let store = Arc::new(InMemoryEventStore::new());
        let task = GithubTask::new(store);

        let outcome = task
            .execute(json!({"sender": {"login": "octocat"}, "repository": "not-an-object"}))
            .await;

        assert!(matches!(outcome, TaskOutcome::PermanentFailure { .. }));
    }

    #[tokio::test]
    async fn github_task_reports_store_failure_as_retryable() {
        let store = Arc::new(InMemoryEventStore::new());
        store.inject_append_error("connection reset").await;
        let task = GithubTask::new(store);

        let outcome = task.execute(github_payload()).await;

        assert!(matches!(outcome, TaskOutcome::RetryableFailure { .. }));
    }

    #[tokio::test]
    async fn stripe_task_persists_any_payload() {
        let store = Arc::new(InMemoryEventStore::new());
        let task = StripeTask::new(store.clone());

        let outcome = task
            .execute(json!({"type": "checkout.session.completed", "data": {}}))
            .await;

        assert!(outcome.is_success());
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn stripe_task_tolerates_missing_type() {
        let store = Arc::new(InMemoryEventStore::new());
        let task = StripeTask::new(store);

        assert!(task.execute(json!({"data": {}})).await.is_success());
    }
}
