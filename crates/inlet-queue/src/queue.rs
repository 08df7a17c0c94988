//! Task queue abstraction and PostgreSQL implementation.
//!
//! The queue owns work items from enqueue until a worker claims them.
//! Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! contend for the same item and each item is owned by exactly one
//! worker per attempt. The trait keeps worker logic testable with the
//! in-memory implementation in [`mock`].

use std::{future::Future, pin::Pin, sync::Arc};

use chrono::{DateTime, Utc};
use inlet_core::models::{TaskRef, WorkItem, WorkItemId};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::Result;

/// Queue operations required by the intake path and the workers.
pub trait TaskQueue: Send + Sync + 'static {
    /// Enqueues a payload for the given routing key.
    ///
    /// The item starts in `pending` status with an attempt count of 0
    /// and becomes claimable immediately.
    fn enqueue(
        &self,
        task: TaskRef,
        payload: Value,
    ) -> Pin<Box<dyn Future<Output = Result<WorkItemId>> + Send + '_>>;

    /// Claims up to `batch_size` due pending items for processing.
    ///
    /// Claimed items transition to `running` atomically with the claim.
    /// Items whose `next_attempt_at` lies in the future are not due and
    /// stay untouched.
    fn claim_pending(
        &self,
        batch_size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<WorkItem>>> + Send + '_>>;

    /// Marks a work item as successfully completed. Terminal.
    fn mark_completed(
        &self,
        id: WorkItemId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns a failed item to `pending` with a scheduled next attempt.
    fn schedule_retry(
        &self,
        id: WorkItemId,
        next_attempt_at: DateTime<Utc>,
        attempt_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Marks a work item as terminally failed with a recorded reason.
    fn mark_failed(
        &self,
        id: WorkItemId,
        reason: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Looks up a work item by id, for monitoring and verification.
    fn find_item(
        &self,
        id: WorkItemId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<WorkItem>>> + Send + '_>>;
}

const WORK_ITEM_COLUMNS: &str =
    "id, task, payload, attempt_count, status, next_attempt_at, enqueued_at, completed_at, \
     failure_reason";

/// Production task queue backed by PostgreSQL.
pub struct PostgresTaskQueue {
    pool: PgPool,
}

impl PostgresTaskQueue {
    /// Creates a queue over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TaskQueue for PostgresTaskQueue {
    fn enqueue(
        &self,
        task: TaskRef,
        payload: Value,
    ) -> Pin<Box<dyn Future<Output = Result<WorkItemId>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let id = WorkItemId::new();

            sqlx::query(
                r"
                INSERT INTO work_items (id, task, payload, attempt_count, status, enqueued_at)
                VALUES ($1, $2, $3, 0, 'pending', NOW())
                ",
            )
            .bind(id)
            .bind(&task)
            .bind(&payload)
            .execute(&pool)
            .await?;

            Ok(id)
        })
    }

    fn claim_pending(
        &self,
        batch_size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<WorkItem>>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let query = format!(
                r"
                UPDATE work_items
                SET status = 'running'
                WHERE id IN (
                    SELECT id FROM work_items
                    WHERE status = 'pending'
                      AND (next_attempt_at IS NULL OR next_attempt_at <= NOW())
                    ORDER BY enqueued_at
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING {WORK_ITEM_COLUMNS}
                "
            );

            let items = sqlx::query_as::<_, WorkItem>(&query)
                .bind(i64::try_from(batch_size).unwrap_or(i64::MAX))
                .fetch_all(&pool)
                .await?;

            Ok(items)
        })
    }

    fn mark_completed(
        &self,
        id: WorkItemId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE work_items
                SET status = 'completed', completed_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .execute(&pool)
            .await?;

            Ok(())
        })
    }

    fn schedule_retry(
        &self,
        id: WorkItemId,
        next_attempt_at: DateTime<Utc>,
        attempt_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE work_items
                SET status = 'pending', next_attempt_at = $2, attempt_count = $3
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(next_attempt_at)
            .bind(i32::try_from(attempt_count).unwrap_or(i32::MAX))
            .execute(&pool)
            .await?;

            Ok(())
        })
    }

    fn mark_failed(
        &self,
        id: WorkItemId,
        reason: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE work_items
                SET status = 'failed', completed_at = NOW(), failure_reason = $2
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(&reason)
            .execute(&pool)
            .await?;

            Ok(())
        })
    }

    fn find_item(
        &self,
        id: WorkItemId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<WorkItem>>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let query = format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = $1");

            let item = sqlx::query_as::<_, WorkItem>(&query)
                .bind(id)
                .fetch_optional(&pool)
                .await?;

            Ok(item)
        })
    }
}

pub mod mock {
    //! In-memory task queue for testing.
    //!
    //! Deterministic queue driven by an injected clock, so tests can
    //! cross retry delays by advancing time. Supports injecting claim
    //! failures to exercise worker error paths.

    use std::collections::HashMap;

    use inlet_core::{models::WorkStatus, time::Clock};
    use tokio::sync::RwLock;

    use super::{
        Arc, DateTime, Future, Pin, Result, TaskQueue, TaskRef, Utc, Value, WorkItem, WorkItemId,
    };
    use crate::error::QueueError;

    /// Task queue holding work items in memory.
    pub struct InMemoryTaskQueue {
        items: Arc<RwLock<HashMap<WorkItemId, WorkItem>>>,
        claim_error: Arc<RwLock<Option<String>>>,
        clock: Arc<dyn Clock>,
    }

    impl InMemoryTaskQueue {
        /// Creates an empty queue with an injected clock.
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                items: Arc::new(RwLock::new(HashMap::new())),
                claim_error: Arc::new(RwLock::new(None)),
                clock,
            }
        }

        /// Makes the next claim fail with a database error.
        pub async fn inject_claim_error(&self, error: impl Into<String>) {
            *self.claim_error.write().await = Some(error.into());
        }

        /// Current status of an item, for verification.
        pub async fn item_status(&self, id: WorkItemId) -> Option<WorkStatus> {
            self.items.read().await.get(&id).map(|item| item.status)
        }

        /// Number of items currently in `pending` status.
        pub async fn pending_count(&self) -> usize {
            self.items
                .read()
                .await
                .values()
                .filter(|item| item.status == WorkStatus::Pending)
                .count()
        }
    }

    impl TaskQueue for InMemoryTaskQueue {
        fn enqueue(
            &self,
            task: TaskRef,
            payload: Value,
        ) -> Pin<Box<dyn Future<Output = Result<WorkItemId>> + Send + '_>> {
            let items = self.items.clone();
            let clock = self.clock.clone();

            Box::pin(async move {
                let id = WorkItemId::new();
                let item = WorkItem {
                    id,
                    task,
                    payload,
                    attempt_count: 0,
                    status: WorkStatus::Pending,
                    next_attempt_at: None,
                    enqueued_at: clock.now_utc(),
                    completed_at: None,
                    failure_reason: None,
                };
                items.write().await.insert(id, item);
                Ok(id)
            })
        }

        fn claim_pending(
            &self,
            batch_size: usize,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<WorkItem>>> + Send + '_>> {
            let items = self.items.clone();
            let claim_error = self.claim_error.clone();
            let clock = self.clock.clone();

            Box::pin(async move {
                if let Some(error) = claim_error.write().await.take() {
                    return Err(QueueError::database(error));
                }

                let now = clock.now_utc();
                let mut guard = items.write().await;

                let mut due: Vec<(DateTime<Utc>, WorkItemId)> = guard
                    .values()
                    .filter(|item| {
                        item.status == WorkStatus::Pending
                            && item.next_attempt_at.is_none_or(|at| at <= now)
                    })
                    .map(|item| (item.enqueued_at, item.id))
                    .collect();
                due.sort_by_key(|(enqueued_at, _)| *enqueued_at);
                due.truncate(batch_size);
                let due: Vec<WorkItemId> = due.into_iter().map(|(_, id)| id).collect();

                let mut claimed = Vec::with_capacity(due.len());
                for id in due {
                    if let Some(item) = guard.get_mut(&id) {
                        item.status = WorkStatus::Running;
                        claimed.push(item.clone());
                    }
                }

                Ok(claimed)
            })
        }

        fn mark_completed(
            &self,
            id: WorkItemId,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let items = self.items.clone();
            let clock = self.clock.clone();

            Box::pin(async move {
                if let Some(item) = items.write().await.get_mut(&id) {
                    item.status = WorkStatus::Completed;
                    item.completed_at = Some(clock.now_utc());
                }
                Ok(())
            })
        }

        fn schedule_retry(
            &self,
            id: WorkItemId,
            next_attempt_at: DateTime<Utc>,
            attempt_count: u32,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let items = self.items.clone();

            Box::pin(async move {
                if let Some(item) = items.write().await.get_mut(&id) {
                    item.status = WorkStatus::Pending;
                    item.next_attempt_at = Some(next_attempt_at);
                    item.attempt_count = i32::try_from(attempt_count).unwrap_or(i32::MAX);
                }
                Ok(())
            })
        }

        fn mark_failed(
            &self,
            id: WorkItemId,
            reason: String,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let items = self.items.clone();
            let clock = self.clock.clone();

            Box::pin(async move {
                if let Some(item) = items.write().await.get_mut(&id) {
                    item.status = WorkStatus::Failed;
                    item.completed_at = Some(clock.now_utc());
                    item.failure_reason = Some(reason);
                }
                Ok(())
            })
        }

        fn find_item(
            &self,
            id: WorkItemId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<WorkItem>>> + Send + '_>> {
            let items = self.items.clone();
            Box::pin(async move { Ok(items.read().await.get(&id).cloned()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use inlet_core::time::{Clock, TestClock};
    use serde_json::json;

    use super::{mock::InMemoryTaskQueue, *};
    use inlet_core::models::WorkStatus;

    fn test_queue() -> (InMemoryTaskQueue, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        (InMemoryTaskQueue::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn enqueued_item_is_claimable() {
        let (queue, _clock) = test_queue();

        let id = queue
            .enqueue(TaskRef::from("process_github_webhook"), json!({"n": 1}))
            .await
            .unwrap();

        let claimed = queue.claim_pending(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].attempt_count, 0);
        assert_eq!(queue.item_status(id).await, Some(WorkStatus::Running));
    }

    #[tokio::test]
    async fn claimed_item_is_not_claimed_twice() {
        let (queue, _clock) = test_queue();

        queue.enqueue(TaskRef::from("task"), json!({})).await.unwrap();

        assert_eq!(queue.claim_pending(10).await.unwrap().len(), 1);
        assert!(queue.claim_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_size_limits_claims_in_fifo_order() {
        let (queue, clock) = test_queue();

        let first = queue.enqueue(TaskRef::from("task"), json!({"n": 1})).await.unwrap();
        clock.advance(Duration::from_secs(1));
        queue.enqueue(TaskRef::from("task"), json!({"n": 2})).await.unwrap();

        let claimed = queue.claim_pending(1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, first);
        assert_eq!(queue.pending_count().await, 1);
    }

    #[tokio::test]
    async fn scheduled_retry_waits_for_its_time() {
        let (queue, clock) = test_queue();

        let id = queue.enqueue(TaskRef::from("task"), json!({})).await.unwrap();
        queue.claim_pending(10).await.unwrap();

        let next_attempt_at = clock.now_utc() + chrono::Duration::seconds(60);
        queue.schedule_retry(id, next_attempt_at, 1).await.unwrap();

        // Not due yet
        assert!(queue.claim_pending(10).await.unwrap().is_empty());

        clock.advance(Duration::from_secs(60));
        let claimed = queue.claim_pending(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempt_count, 1);
    }

    #[tokio::test]
    async fn failed_item_keeps_its_reason() {
        let (queue, _clock) = test_queue();

        let id = queue.enqueue(TaskRef::from("task"), json!({})).await.unwrap();
        queue.claim_pending(10).await.unwrap();
        queue.mark_failed(id, "retries exhausted after 4 attempts".into()).await.unwrap();

        let item = queue.find_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, WorkStatus::Failed);
        assert_eq!(item.failure_reason.as_deref(), Some("retries exhausted after 4 attempts"));
        assert!(item.completed_at.is_some());
    }

    #[tokio::test]
    async fn injected_claim_error_surfaces_once() {
        let (queue, _clock) = test_queue();
        queue.inject_claim_error("connection reset").await;

        assert!(queue.claim_pending(10).await.is_err());
        assert!(queue.claim_pending(10).await.is_ok());
    }
}
