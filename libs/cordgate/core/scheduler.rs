//! Timer implementations
//!
//! [`TokioScheduler`] backs production sessions. Each timer is a tokio task
//! that checks its [`TimerHandle`] before firing. Repeating timers skip the
//! immediate first tick and skip missed ticks rather than bursting.
//!
//! [`ManualScheduler`] is a virtual clock: nothing fires until
//! [`ManualScheduler::advance`] moves time forward. Used by tests to drive
//! heartbeats and retries deterministically.

use crate::traits::{GatewayError, OnceTask, RepeatTask, Result, Scheduler, TimerHandle};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Scheduler spawning timer tasks on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Bind to the runtime of the calling context
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| GatewayError::Configuration(format!("no tokio runtime: {}", e)))
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let guard = handle.clone();

        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !guard.is_cancelled() {
                task();
            }
        });

        handle
    }

    fn every(&self, interval: Duration, mut task: RepeatTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let guard = handle.clone();

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if guard.is_cancelled() {
                    debug!("Repeating timer cancelled (interval {:?})", interval);
                    break;
                }
                task();
            }
        });

        handle
    }
}

enum ManualTask {
    Once(OnceTask),
    Repeat(RepeatTask, Duration),
}

struct ManualTimer {
    id: u64,
    due: Duration,
    task: ManualTask,
    handle: TimerHandle,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

impl ManualClock {
    fn push(&mut self, due: Duration, task: ManualTask, handle: TimerHandle) {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.push(ManualTimer {
            id,
            due,
            task,
            handle,
        });
    }

    /// Remove and return the earliest live timer due at or before `target`
    fn pop_due(&mut self, target: Duration) -> Option<ManualTimer> {
        self.timers.retain(|t| !t.handle.is_cancelled());
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(self.timers.swap_remove(index))
    }
}

/// Virtual-clock scheduler
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Live timers not yet fired
    pub fn pending(&self) -> usize {
        self.clock
            .lock()
            .timers
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Move time forward by `by`, firing every timer that comes due in
    /// deadline order. Callbacks run without the clock lock held, so they
    /// may schedule further timers.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().now + by;

        loop {
            let next = {
                let mut clock = self.clock.lock();
                match clock.pop_due(target) {
                    Some(timer) => {
                        clock.now = timer.due;
                        timer
                    }
                    None => {
                        clock.now = target;
                        return;
                    }
                }
            };

            match next.task {
                ManualTask::Once(task) => task(),
                ManualTask::Repeat(mut task, interval) => {
                    task();
                    if !next.handle.is_cancelled() {
                        let due = next.due + interval;
                        self.clock
                            .lock()
                            .push(due, ManualTask::Repeat(task, interval), next.handle);
                    }
                }
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        clock.push(due, ManualTask::Once(task), handle.clone());
        handle
    }

    fn every(&self, interval: Duration, task: RepeatTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut clock = self.clock.lock();
        let due = clock.now + interval;
        clock.push(due, ManualTask::Repeat(task, interval), handle.clone());
        handle
    }
}
