//! Worker pool lifecycle management.
//!
//! Spawns the configured number of supervised worker tasks and provides
//! graceful shutdown with a bounded timeout. Dropping a pool without
//! shutting it down cancels its workers so no tasks are orphaned.

use std::{sync::Arc, time::Duration};

use inlet_core::{registry::SourceRegistry, time::Clock};
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{QueueError, Result},
    queue::TaskQueue,
    worker::{Worker, WorkerConfig, WorkerStats},
};

/// Pool of supervised processing workers.
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    registry: Arc<SourceRegistry>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<Result<()>>>,
    clock: Arc<dyn Clock>,
}

impl WorkerPool {
    /// Creates a pool with the given configuration.
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        registry: Arc<SourceRegistry>,
        config: WorkerConfig,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            registry,
            config,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            cancellation_token,
            worker_handles: Vec::new(),
            clock,
        }
    }

    /// Spawns all configured workers and begins processing.
    ///
    /// Workers run until cancellation is requested. Returns immediately
    /// after spawning.
    pub async fn spawn_workers(&mut self) {
        info!(worker_count = self.config.worker_count, "spawning processing workers");

        {
            let mut stats = self.stats.write().await;
            stats.active_workers = self.config.worker_count;
        }

        for worker_id in 0..self.config.worker_count {
            let worker = Worker::new(
                worker_id,
                self.queue.clone(),
                self.registry.clone(),
                self.config.clone(),
                self.stats.clone(),
                self.cancellation_token.clone(),
                self.clock.clone(),
            );

            let handle = tokio::spawn(async move {
                let result = worker.run().await;

                if let Err(ref error) = result {
                    error!(worker_id, error = %error, "worker terminated with error");
                }

                result
            });

            self.worker_handles.push(handle);
        }

        info!(spawned_workers = self.worker_handles.len(), "all processing workers spawned");
    }

    /// Gracefully shuts down all workers.
    ///
    /// Signals cancellation and waits up to `timeout` for in-flight
    /// attempts to complete.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if workers do not finish in time, or
    /// `WorkerPanic` if any worker task panicked before or during
    /// shutdown.
    pub async fn shutdown_graceful(mut self, timeout: Duration) -> Result<()> {
        info!(
            worker_count = self.worker_handles.len(),
            timeout_seconds = timeout.as_secs(),
            "initiating graceful worker shutdown"
        );

        self.cancellation_token.cancel();

        let stats = self.stats.clone();
        let handles = std::mem::take(&mut self.worker_handles);
        let shutdown_future = async move {
            let mut first_panic: Option<QueueError> = None;

            for (worker_id, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(worker_result) => {
                        if let Err(error) = worker_result {
                            warn!(
                                worker_id,
                                error = %error,
                                "worker completed with error during shutdown"
                            );
                        }
                    },
                    Err(join_error) => {
                        error!(
                            worker_id,
                            error = %join_error,
                            "worker task panicked during shutdown"
                        );
                        if first_panic.is_none() {
                            first_panic = Some(QueueError::WorkerPanic {
                                worker_id,
                                error: join_error.to_string(),
                            });
                        }
                    },
                }
            }

            stats.write().await.active_workers = 0;
            first_panic
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(None) => {
                info!("worker pool shutdown completed");
                Ok(())
            },
            Ok(Some(panic_error)) => {
                warn!(error = %panic_error, "worker pool shutdown found panicked workers");
                Err(panic_error)
            },
            Err(_elapsed) => {
                error!(
                    timeout_seconds = timeout.as_secs(),
                    "worker shutdown timed out, some workers may still be running"
                );
                Err(QueueError::ShutdownTimeout { timeout })
            },
        }
    }

    /// Checks if any workers are still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|handle| !handle.is_finished())
    }

    /// Snapshot of the pool's counters.
    pub async fn stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let active_count = self.worker_handles.iter().filter(|h| !h.is_finished()).count();

        if active_count > 0 && !self.cancellation_token.is_cancelled() {
            error!(
                active_workers = active_count,
                "worker pool dropped with active workers, forcing cancellation"
            );
            self.cancellation_token.cancel();
        }
    }
}
