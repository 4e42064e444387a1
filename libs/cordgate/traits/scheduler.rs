use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot timer callback
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Repeating timer callback
pub type RepeatTask = Box<dyn FnMut() + Send + 'static>;

/// Cancels a scheduled timer. Cancelling twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Timer capability used for heartbeats, resume retries and connect staggering
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Run `task` every `interval`, first run one interval from now
    fn every(&self, interval: Duration, task: RepeatTask) -> TimerHandle;
}
