//! Error types for queue and worker operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors raised by the task queue and worker pool.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Database operation failed.
    #[error("database error: {message}")]
    Database {
        /// Database error message
        message: String,
    },

    /// A claimed work item names a routing key no task is registered
    /// under.
    #[error("no processing task registered for '{task}'")]
    UnknownTask {
        /// The unresolved routing key
        task: String,
    },

    /// Worker shutdown exceeded the configured timeout.
    #[error("worker shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// A worker task panicked.
    #[error("worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Index of the panicked worker
        worker_id: usize,
        /// Panic message from the join error
        error: String,
    },
}

impl QueueError {
    /// Creates a database error from a message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into() }
    }

    /// Creates an unknown-task error for a routing key.
    pub fn unknown_task(task: impl Into<String>) -> Self {
        Self::UnknownTask { task: task.into() }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { message: error.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        let error = QueueError::unknown_task("process_gitlab_webhook");
        assert_eq!(error.to_string(), "no processing task registered for 'process_gitlab_webhook'");

        let error = QueueError::WorkerPanic { worker_id: 2, error: "boom".into() };
        assert_eq!(error.to_string(), "worker 2 panicked: boom");
    }
}
