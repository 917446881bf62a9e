//! Deletion waiter.
//!
//! Polls a stack's existence at a fixed interval until it disappears or the
//! maximum wait elapses.

use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::ResourceBackend;
use crate::config::WaiterConfig;
use crate::error::Result;
use crate::planner::StackRef;

use super::clock::Clock;

/// Smallest poll interval the waiter will use.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll timing for a single stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Delay between existence polls.
    pub poll_interval: Duration,
    /// Maximum time to wait for the stack to disappear.
    pub max_wait: Duration,
}

impl WaitConfig {
    /// Creates a wait configuration. A zero interval is raised to 1ms.
    #[must_use]
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            max_wait,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::from(&WaiterConfig::default())
    }
}

impl From<&WaiterConfig> for WaitConfig {
    fn from(config: &WaiterConfig) -> Self {
        Self::new(config.poll_interval(), config.max_wait())
    }
}

/// Waits for a requested deletion to complete.
#[derive(Debug)]
pub struct DeletionWaiter<'a, B: ?Sized, C: ?Sized> {
    backend: &'a B,
    clock: &'a C,
    config: WaitConfig,
}

impl<'a, B, C> DeletionWaiter<'a, B, C>
where
    B: ResourceBackend + ?Sized,
    C: Clock + ?Sized,
{
    /// Creates a waiter over a backend and clock.
    #[must_use]
    pub const fn new(backend: &'a B, clock: &'a C, config: WaitConfig) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    /// Polls until the stack is gone.
    ///
    /// Returns `Ok(true)` once the backend reports absence and `Ok(false)` if
    /// `max_wait` elapses first. The stack is always polled at least once.
    /// Unavailable checks count as "still exists".
    ///
    /// # Errors
    ///
    /// Returns any backend error other than an unavailable check, e.g. a
    /// deletion that ended in a failed state.
    pub async fn wait_until_gone(&self, stack: &StackRef) -> Result<bool> {
        let started = self.clock.elapsed();
        let mut polls = 0u32;

        // At least one poll, even with a zero budget.
        loop {
            polls += 1;

            match self.backend.exists(stack).await {
                Ok(false) => {
                    debug!("Stack {stack} gone after {polls} polls");
                    return Ok(true);
                }
                Ok(true) => debug!("Stack {stack} still exists (poll {polls})"),
                Err(e) if e.is_transient() => {
                    warn!("Existence check for {stack} failed, treating as still present: {e}");
                }
                Err(e) => return Err(e),
            }

            self.clock.sleep(self.config.poll_interval).await;
            if self.clock.elapsed().saturating_sub(started) >= self.config.max_wait {
                break;
            }
        }

        warn!(
            "Timed out after {}s waiting for {stack} to be deleted ({polls} polls)",
            self.config.max_wait.as_secs()
        );
        Ok(false)
    }
}
