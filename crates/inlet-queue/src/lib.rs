//! Task queue and processing workers for the inlet webhook service.
//!
//! Implements the asynchronous half of the intake pipeline: verified
//! payloads are enqueued as work items in PostgreSQL, and a pool of
//! async workers claims them with `FOR UPDATE SKIP LOCKED` for lock-free
//! distribution. Each worker resolves the item's routing key to a
//! processing task, runs one attempt, and applies the retry policy to
//! the reported outcome:
//!
//! 1. **Claim Items** - Worker claims due pending items from the queue
//! 2. **Resolve Task** - Routing key resolved through the source registry
//! 3. **Execute** - Task runs and reports an explicit outcome
//! 4. **Settle** - Item completes, schedules a retry, or fails terminally
//!
//! Failed items that exhaust their retry budget keep their row in
//! `failed` status with the failure reason recorded, so nothing is lost
//! silently.

pub mod error;
pub mod queue;
pub mod retry;
pub mod tasks;
pub mod worker;
pub mod worker_pool;

pub use error::{QueueError, Result};
pub use queue::{PostgresTaskQueue, TaskQueue};
pub use retry::{RetryDecision, RetryPolicy};
pub use worker::{Worker, WorkerConfig, WorkerStats};
pub use worker_pool::WorkerPool;

/// Default number of concurrent processing workers.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Default batch size for claiming work items from the queue.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default retry budget per work item, not counting the initial attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before a scheduled retry runs, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
