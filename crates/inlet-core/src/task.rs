//! Processing task contract.
//!
//! A processing task is the unit of asynchronous work a source's
//! notifications are routed to. Tasks report their result as an explicit
//! [`TaskOutcome`] value; the queue decides retry or terminal failure
//! from the outcome, never from a panic or error escape.

use std::{fmt, future::Future, pin::Pin};

use serde_json::Value;

use crate::models::TaskRef;

/// Result of one processing attempt.
///
/// The retry policy only ever sees this value, so a task states its own
/// failure semantics instead of the queue guessing from an error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The attempt succeeded; the item is complete.
    Success,

    /// The payload can never be processed. No retry is scheduled.
    PermanentFailure {
        /// Why the payload was rejected
        reason: String,
    },

    /// The attempt failed for a reason expected to clear. Eligible for a
    /// scheduled retry if budget remains.
    RetryableFailure {
        /// Why the attempt failed
        reason: String,
    },
}

impl TaskOutcome {
    /// Permanent failure with the given reason.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure { reason: reason.into() }
    }

    /// Retryable failure with the given reason.
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::RetryableFailure { reason: reason.into() }
    }

    /// Returns true for [`TaskOutcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Asynchronous processing logic a work item is routed to.
///
/// Implementations persist the event record and run any side effects for
/// one payload. Attempts must be idempotent with respect to side effects
/// other than the event append, since a retried payload runs the whole
/// task again.
pub trait ProcessingTask: Send + Sync {
    /// Routing key work items addressed to this task carry.
    fn task_ref(&self) -> TaskRef;

    /// Runs one processing attempt over the payload.
    fn execute(&self, payload: Value) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>>;
}

impl fmt::Debug for dyn ProcessingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingTask").field("task_ref", &self.task_ref()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_constructors_carry_reason() {
        let outcome = TaskOutcome::retryable("store unavailable");
        assert_eq!(
            outcome,
            TaskOutcome::RetryableFailure { reason: "store unavailable".into() }
        );
        assert!(!outcome.is_success());

        assert!(TaskOutcome::Success.is_success());
    }
}
