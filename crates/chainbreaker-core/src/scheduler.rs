//! Restartable periodic scheduler.
//!
//! A [`Scheduler`] binds one callback to one period and can be started and
//! stopped any number of times. Every start opens a new generation; ticks
//! carry the generation they were fired under, so an owner that serialises
//! its callbacks behind a lock can drop ticks that raced with a `stop()` by
//! checking [`Scheduler::is_current`] inside that lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, TickFn, TimerHandle};

/// One timer firing, stamped with the scheduler generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
}

impl Tick {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

type TaskFn = Arc<dyn Fn(Tick) + Send + Sync>;

/// Periodic callback runner with idempotent `start` / `stop`.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    period: Duration,
    task: TaskFn,
    generation: Arc<AtomicU64>,
    timer: Mutex<Option<TimerHandle>>,
}

impl Scheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        period: Duration,
        task: impl Fn(Tick) + Send + Sync + 'static,
    ) -> Self {
        Self {
            clock,
            period,
            task: Arc::new(task),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Mutex::new(None),
        }
    }

    /// Arm the timer. The first tick arrives one full period from now.
    /// No-op while already running.
    pub fn start(&self) {
        let mut timer = self.lock();
        if timer.is_some() {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let task = Arc::clone(&self.task);
        let tick: TickFn = Arc::new(move || {
            if current.load(Ordering::SeqCst) == generation {
                task(Tick { generation });
            }
        });
        *timer = Some(self.clock.every(self.period, tick));
    }

    /// Cancel the timer. No-op while stopped.
    pub fn stop(&self) {
        let mut timer = self.lock();
        if let Some(handle) = timer.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            handle.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// `true` if `tick` was fired by the current run, i.e. no `stop()` or
    /// restart has happened since.
    pub fn is_current(&self, tick: Tick) -> bool {
        self.generation.load(Ordering::SeqCst) == tick.generation
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn lock(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}
