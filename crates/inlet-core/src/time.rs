//! Clock abstraction for testable timing.
//!
//! Retry scheduling and worker polling depend on time; injecting the
//! clock lets tests drive both deterministically instead of sleeping.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};

/// Time source injected into the queue and workers.
///
/// Production code uses [`RealClock`]; tests inject [`TestClock`] to
/// advance time without waiting.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock time for timestamps.
    fn now_system(&self) -> SystemTime;

    /// Sleeps for the specified duration.
    ///
    /// Maps to `tokio::time::sleep` in production; a test clock advances
    /// virtual time immediately instead.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Returns the current wall-clock time as a UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now_system())
    }
}

/// System-time clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Controllable clock for deterministic tests.
///
/// Time only moves when a test advances it, so retry delays and poll
/// intervals can be crossed instantly.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Wall-clock time as nanoseconds since UNIX_EPOCH
    system_ns: Arc<AtomicU64>,
}

impl TestClock {
    /// Creates a test clock starting at the current time.
    pub fn new() -> Self {
        Self::with_start_time(SystemTime::now())
    }

    /// Creates a test clock starting at a specific time.
    pub fn with_start_time(start: SystemTime) -> Self {
        let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();
        let start_ns =
            u64::try_from(since_epoch.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);

        Self {
            system_ns: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    /// Advances the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let duration_ns =
            u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.system_ns.fetch_add(duration_ns, Ordering::AcqRel);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_system(&self) -> SystemTime {
        let ns = self.system_ns.load(Ordering::Acquire);
        UNIX_EPOCH + Duration::from_nanos(ns)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        // Yield so other tasks observe the advanced time
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_where_told() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_system(), start);

        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now_system(), start + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_clock_sleep_advances_time() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(500);
        let clock = TestClock::with_start_time(start);

        clock.sleep(Duration::from_secs(5)).await;

        assert_eq!(clock.now_system(), start + Duration::from_secs(5));
    }

    #[test]
    fn utc_conversion_tracks_system_time() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_utc().timestamp(), 1_700_000_000);
    }
}
