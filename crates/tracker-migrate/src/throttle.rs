//! Static inter-operation delay.
//!
//! Both trackers enforce rate limits, so every destination write and every
//! heavy source fetch is preceded by a fixed pause. The delay never adapts
//! and failed operations are never retried.

use std::time::Duration;
use tokio::time::sleep;
use tracing::trace;

/// Fixed delay inserted before rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    delay: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from_millis(3000)
    }
}

impl Throttle {
    /// Creates a throttle with the given delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a throttle from a millisecond delay.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Creates a throttle that never waits (tests, dry runs).
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits for the configured delay before an operation.
    pub async fn pause(&self, operation: &str) {
        if self.delay.is_zero() {
            return;
        }
        trace!("{}: waiting {:?}", operation, self.delay);
        sleep(self.delay).await;
    }
}
