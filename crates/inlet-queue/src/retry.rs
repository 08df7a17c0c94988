//! Fixed-delay retry policy for failed processing attempts.
//!
//! Transient failures are retried a bounded number of times with a
//! constant delay between attempts. The policy only sees the item's
//! attempt count; whether a failure is retryable at all is decided by
//! the task's reported outcome, not here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retry configuration applied to every work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum scheduled retries per item, not counting the initial
    /// attempt.
    pub max_attempts: u32,

    /// Delay between a failed attempt and its scheduled retry.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(crate::DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Result of a retry decision for one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt at the given time.
    Retry {
        /// Earliest time the next attempt may run
        next_attempt_at: DateTime<Utc>,
    },

    /// The retry budget is spent; fail the item terminally.
    GiveUp {
        /// Why no further attempt will be made
        reason: String,
    },
}

impl RetryPolicy {
    /// Decides whether a transiently failed attempt gets another try.
    ///
    /// `attempt_count` is the number of failed attempts before this one,
    /// so an item fresh from intake arrives here with 0. With the
    /// default budget of 3 an item runs at most four times.
    pub fn decide(&self, attempt_count: u32, failed_at: DateTime<Utc>) -> RetryDecision {
        if attempt_count >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!(
                    "retries exhausted after {} attempts",
                    attempt_count.saturating_add(1)
                ),
            };
        }

        let delay = chrono::Duration::from_std(self.retry_delay)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX));

        RetryDecision::Retry { next_attempt_at: failed_at + delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_budget_spent() {
        let policy = RetryPolicy::default();
        let failed_at = Utc::now();

        for attempt_count in 0..3 {
            match policy.decide(attempt_count, failed_at) {
                RetryDecision::Retry { next_attempt_at } => {
                    assert_eq!(next_attempt_at, failed_at + chrono::Duration::seconds(60));
                },
                RetryDecision::GiveUp { .. } => {
                    unreachable!("attempt {attempt_count} should be retried");
                },
            }
        }
    }

    #[test]
    fn gives_up_at_max_attempts() {
        let policy = RetryPolicy::default();

        match policy.decide(3, Utc::now()) {
            RetryDecision::GiveUp { reason } => {
                assert_eq!(reason, "retries exhausted after 4 attempts");
            },
            RetryDecision::Retry { .. } => unreachable!("budget is spent at 3 failures"),
        }
    }

    #[test]
    fn zero_budget_never_retries() {
        let policy = RetryPolicy { max_attempts: 0, ..Default::default() };

        assert!(matches!(policy.decide(0, Utc::now()), RetryDecision::GiveUp { .. }));
    }

    #[test]
    fn custom_delay_respected() {
        let policy = RetryPolicy { retry_delay: Duration::from_secs(5), ..Default::default() };
        let failed_at = Utc::now();

        match policy.decide(1, failed_at) {
            RetryDecision::Retry { next_attempt_at } => {
                assert_eq!(next_attempt_at, failed_at + chrono::Duration::seconds(5));
            },
            RetryDecision::GiveUp { .. } => unreachable!("budget remains"),
        }
    }
}
