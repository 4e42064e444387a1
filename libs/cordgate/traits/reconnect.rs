use std::sync::Arc;
use std::time::Duration;

/// Default delay between resume attempts after the immediate one
pub const DEFAULT_RESUME_DELAY: Duration = Duration::from_secs(10);

/// Controls how a shard spaces out its resume attempts
///
/// A session that loses its transport opens a new one immediately, then
/// asks the strategy how long to wait before each further attempt.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before retry number `attempt` (0-indexed, counted after the
    /// immediate attempt). `None` means give up.
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Whether retry number `attempt` is allowed at all
    fn should_reconnect(&self, attempt: usize) -> bool;
}

impl<S: ReconnectionStrategy + ?Sized> ReconnectionStrategy for Arc<S> {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        (**self).next_delay(attempt)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        (**self).should_reconnect(attempt)
    }
}

/// Exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// # Arguments
    /// * `initial_delay` - Delay before the first retry
    /// * `max_delay` - Upper bound for any single delay
    /// * `max_attempts` - Maximum number of retries (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 2u64.saturating_pow(attempt.min(32) as u32);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(delay.min(self.max_delay.as_millis() as u64)))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Same delay between every retry
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl Default for FixedDelay {
    /// Retry every 10 seconds until a connection succeeds or the shard is
    /// explicitly disconnected.
    fn default() -> Self {
        Self::new(DEFAULT_RESUME_DELAY, None)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Only the immediate attempt is made; no scheduled retries
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
