//! Time sources for the teardown loop.
//!
//! The waiter only ever sleeps through a [`Clock`], so tests can drive it with
//! a [`VirtualClock`] that advances instantly instead of sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Source of monotonic time, wall time and sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Current wall-clock time, used for report timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Blocks the current task for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Creates a clock whose elapsed time starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: sleeping advances time immediately.
#[derive(Debug)]
pub struct VirtualClock {
    start: DateTime<Utc>,
    state: Mutex<VirtualState>,
}

#[derive(Debug, Default)]
struct VirtualState {
    offset: Duration,
    sleeps: u32,
}

impl VirtualClock {
    /// Creates a virtual clock whose wall time starts at `start`.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            state: Mutex::new(VirtualState::default()),
        }
    }

    /// Number of sleeps taken so far.
    #[must_use]
    pub fn sleep_count(&self) -> u32 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).sleeps
    }

    /// Moves time forward without counting a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset += duration;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn elapsed(&self) -> Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).offset
    }

    fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.elapsed())
            .ok()
            .and_then(|offset| self.start.checked_add_signed(offset))
            .unwrap_or(self.start)
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset += duration;
        state.sleeps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_virtual_sleep_advances_time() {
        let clock = VirtualClock::default();

        clock.sleep(Duration::from_secs(10)).await;
        clock.sleep(Duration::from_secs(5)).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(15));
        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(clock.now().timestamp(), 15);
    }

    #[test]
    fn test_advance_does_not_count_as_sleep() {
        let clock = VirtualClock::default();
        clock.advance(Duration::from_secs(3));

        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert_eq!(clock.sleep_count(), 0);

        tokio_test::block_on(clock.sleep(Duration::from_secs(2)));
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
        assert_eq!(clock.sleep_count(), 1);
    }

    #[tokio::test]
    async fn test_tokio_clock_sleeps() {
        let clock = TokioClock::new();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.elapsed() >= Duration::from_millis(5));
    }
}
