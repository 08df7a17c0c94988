//! Processing worker claiming and settling work items.
//!
//! Each worker loops: claim a batch of due items, resolve each item's
//! routing key through the source registry, run the task, and settle the
//! item from its reported outcome. Items are settled through the queue
//! so the attempt counter stays authoritative there.

use std::{sync::Arc, time::Duration};

use inlet_core::{
    models::WorkItem, registry::SourceRegistry, task::TaskOutcome, time::Clock,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{QueueError, Result},
    queue::TaskQueue,
    retry::{RetryDecision, RetryPolicy},
};

/// Configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent processing workers.
    pub worker_count: usize,

    /// Maximum items to claim per worker batch.
    pub batch_size: usize,

    /// How often workers poll when the queue is empty.
    pub poll_interval: Duration,

    /// Retry policy applied to transient failures.
    pub retry_policy: RetryPolicy,

    /// Maximum time to wait for workers to finish during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            batch_size: crate::DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for worker pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Number of active workers.
    pub active_workers: usize,
    /// Total items processed since startup.
    pub items_processed: u64,
    /// Items that completed successfully.
    pub completed: u64,
    /// Items that failed and were scheduled for retry.
    pub retried: u64,
    /// Items that failed terminally.
    pub failed: u64,
}

/// One processing worker.
pub struct Worker {
    id: usize,
    queue: Arc<dyn TaskQueue>,
    registry: Arc<SourceRegistry>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl Worker {
    /// Creates a worker with the given configuration.
    pub fn new(
        id: usize,
        queue: Arc<dyn TaskQueue>,
        registry: Arc<SourceRegistry>,
        config: WorkerConfig,
        stats: Arc<RwLock<WorkerStats>>,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { id, queue, registry, config, stats, cancellation_token, clock }
    }

    /// Main worker loop. Claims and processes items until cancelled.
    ///
    /// # Errors
    ///
    /// Returns error only if worker setup fails. Batch errors are logged
    /// and the loop backs off before retrying.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = self.id, "processing worker starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                info!(worker_id = self.id, "processing worker received shutdown signal");
                break;
            }

            match self.process_batch().await {
                Ok(0) => {
                    tokio::select! {
                        () = self.clock.sleep(self.config.poll_interval) => {}
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
                Ok(_) => {},
                Err(error) => {
                    error!(
                        worker_id = self.id,
                        error = %error,
                        "worker batch processing failed"
                    );
                    // Back off to avoid a tight error loop
                    tokio::select! {
                        () = self.clock.sleep(Duration::from_secs(5)) => {}
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
            }
        }

        info!(worker_id = self.id, "processing worker stopped");
        Ok(())
    }

    /// Claims and processes one batch of due items.
    ///
    /// Returns the number of items claimed so the caller can idle when
    /// the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns error if claiming from the queue fails. Per-item failures
    /// are settled on the item, not surfaced here.
    pub async fn process_batch(&self) -> Result<usize> {
        let items = self.queue.claim_pending(self.config.batch_size).await?;
        let batch_size = items.len();

        debug!(worker_id = self.id, batch_size, "processing work item batch");

        for item in items {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            if let Err(error) = self.process_item(item).await {
                error!(
                    worker_id = self.id,
                    error = %error,
                    "work item settlement failed"
                );
            }
        }

        Ok(batch_size)
    }

    /// Runs one attempt for a claimed item and settles the result.
    ///
    /// # Errors
    ///
    /// Returns error if updating the item's queue state fails.
    async fn process_item(&self, item: WorkItem) -> Result<()> {
        let task = match self.registry.task(&item.task) {
            Ok(task) => task,
            Err(_) => {
                // Routing keys come from the registry at enqueue time, so
                // this only happens when registrations change across restarts
                let error = QueueError::unknown_task(item.task.to_string());
                warn!(
                    worker_id = self.id,
                    item_id = %item.id,
                    task = %item.task,
                    "claimed item has no registered task, failing terminally"
                );
                self.queue.mark_failed(item.id, error.to_string()).await?;
                self.note_outcome(|stats| stats.failed += 1).await;
                return Ok(());
            },
        };

        let outcome = task.execute(item.payload.clone()).await;

        match outcome {
            TaskOutcome::Success => {
                self.queue.mark_completed(item.id).await?;
                self.note_outcome(|stats| stats.completed += 1).await;
                info!(
                    worker_id = self.id,
                    item_id = %item.id,
                    task = %item.task,
                    "work item completed"
                );
            },
            TaskOutcome::PermanentFailure { reason } => {
                self.queue.mark_failed(item.id, reason.clone()).await?;
                self.note_outcome(|stats| stats.failed += 1).await;
                error!(
                    worker_id = self.id,
                    item_id = %item.id,
                    task = %item.task,
                    reason = %reason,
                    "work item rejected permanently"
                );
            },
            TaskOutcome::RetryableFailure { reason } => {
                self.settle_retryable_failure(&item, &reason).await?;
            },
        }

        Ok(())
    }

    async fn settle_retryable_failure(&self, item: &WorkItem, reason: &str) -> Result<()> {
        let attempt_count = u32::try_from(item.attempt_count).unwrap_or(u32::MAX);
        let failed_at = self.clock.now_utc();

        match self.config.retry_policy.decide(attempt_count, failed_at) {
            RetryDecision::Retry { next_attempt_at } => {
                self.queue
                    .schedule_retry(item.id, next_attempt_at, attempt_count.saturating_add(1))
                    .await?;
                self.note_outcome(|stats| stats.retried += 1).await;
                warn!(
                    worker_id = self.id,
                    item_id = %item.id,
                    task = %item.task,
                    attempt_count,
                    next_attempt_at = %next_attempt_at,
                    reason = %reason,
                    "attempt failed, retry scheduled"
                );
            },
            RetryDecision::GiveUp { reason: exhausted } => {
                self.queue.mark_failed(item.id, exhausted.clone()).await?;
                self.note_outcome(|stats| stats.failed += 1).await;
                error!(
                    worker_id = self.id,
                    item_id = %item.id,
                    task = %item.task,
                    attempt_count,
                    reason = %reason,
                    "work item failed permanently: {exhausted}"
                );
            },
        }

        Ok(())
    }

    async fn note_outcome(&self, update: impl FnOnce(&mut WorkerStats)) {
        let mut stats = self.stats.write().await;
        stats.items_processed += 1;
        update(&mut stats);
    }
}
