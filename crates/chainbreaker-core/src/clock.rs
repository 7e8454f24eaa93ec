//! Time sources: the current instant plus periodic timers.
//!
//! Production code uses [`SystemClock`], which runs timers on Tokio. Tests use
//! [`ManualClock`], whose time only moves when [`ManualClock::advance`] is
//! called and which fires due timers synchronously on the calling thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Callback invoked on every timer tick.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Smallest period a timer may be armed with.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A time source that can also arm periodic timers.
///
/// Implementations must be safe to share between threads; the breaker reads
/// `now()` from caller threads and timer callbacks alike.
pub trait Clock: Send + Sync + 'static {
    /// The current instant.
    fn now(&self) -> Instant;

    /// Invoke `task` every `period`, first at `now() + period`, until the
    /// returned handle is cancelled or dropped.
    fn every(&self, period: Duration, task: TickFn) -> TimerHandle;
}

/// A running timer that can be cancelled.
pub trait Timer: Send + Sync {
    /// Stop the timer. Calling this more than once is harmless.
    fn cancel(&self);
}

/// Owned handle to a running timer. Dropping it cancels the timer.
pub struct TimerHandle {
    timer: Box<dyn Timer>,
}

impl TimerHandle {
    pub fn new(timer: impl Timer + 'static) -> Self {
        Self {
            timer: Box::new(timer),
        }
    }

    pub fn cancel(&self) {
        self.timer.cancel();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

// ─── SystemClock ──────────────────────────────────────────────────────────────

/// Wall clock with timers driven by a Tokio runtime.
///
/// Created inside a runtime, timers run on that runtime. Created outside one,
/// timers run on a shared single-worker runtime started on first use.
#[derive(Clone)]
pub struct SystemClock {
    handle: Handle,
}

impl SystemClock {
    pub fn new() -> Self {
        let handle = Handle::try_current()
            .unwrap_or_else(|_| background_runtime().handle().clone());
        Self { handle }
    }

    /// Run timers on a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClock").finish_non_exhaustive()
    }
}

fn background_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("chainbreaker-timer")
            .enable_time()
            .build()
            .expect("failed to build chainbreaker timer runtime")
    })
}

struct TokioTimer(JoinHandle<()>);

impl Timer for TokioTimer {
    fn cancel(&self) {
        self.0.abort();
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        // Tokio's instant honours a paused test clock and matches the timers below.
        tokio::time::Instant::now().into_std()
    }

    fn every(&self, period: Duration, task: TickFn) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        let join = self.handle.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                task();
            }
        });
        TimerHandle::new(TokioTimer(join))
    }
}

// ─── ManualClock ──────────────────────────────────────────────────────────────

struct ManualEntry {
    period: Duration,
    next_fire: Instant,
    task: TickFn,
}

struct ManualState {
    now: Instant,
    next_id: u64,
    timers: BTreeMap<u64, ManualEntry>,
}

/// Deterministic clock for tests.
///
/// Time stands still until [`advance`](ManualClock::advance) moves it; every
/// timer that falls due inside the advanced span fires on the calling thread,
/// in deadline order, once per elapsed period.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                next_id: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Move time forward by `by`, firing every timer that becomes due.
    ///
    /// Callbacks run without the clock's lock held, so they may read the
    /// clock and arm or cancel timers. A timer armed by a callback fires in
    /// the same call if its first deadline is still inside the span.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let task = {
                let mut state = self.lock();
                let due = state
                    .timers
                    .iter()
                    .filter(|(_, entry)| entry.next_fire <= target)
                    .min_by_key(|(id, entry)| (entry.next_fire, **id))
                    .map(|(id, _)| *id);

                let Some(id) = due else {
                    state.now = state.now.max(target);
                    break;
                };
                let Some(entry) = state.timers.get_mut(&id) else {
                    break;
                };
                let fire_at = entry.next_fire;
                entry.next_fire += entry.period;
                let task = Arc::clone(&entry.task);
                state.now = state.now.max(fire_at);
                task
            };
            task();
        }
    }

    /// Number of timers currently armed.
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("timers", &state.timers.len())
            .finish()
    }
}

struct ManualTimer {
    id: u64,
    state: Weak<Mutex<ManualState>>,
}

impl Timer for ManualTimer {
    fn cancel(&self) {
        if let Some(state) = self.state.upgrade() {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .timers
                .remove(&self.id);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn every(&self, period: Duration, task: TickFn) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let next_fire = state.now + period;
        state.timers.insert(
            id,
            ManualEntry {
                period,
                next_fire,
                task,
            },
        );
        TimerHandle::new(ManualTimer {
            id,
            state: Arc::downgrade(&self.state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickFn) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn manual_clock_only_moves_on_advance() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), t0 + Duration::from_secs(5));
    }

    #[test]
    fn timer_fires_once_per_elapsed_period() {
        let clock = ManualClock::new();
        let (count, task) = counter();
        let _timer = clock.every(Duration::from_secs(10), task);

        clock.advance(Duration::from_secs(9));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        clock.advance(Duration::from_secs(35));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn cancelled_timer_stops_firing() {
        let clock = ManualClock::new();
        let (count, task) = counter();
        let timer = clock.every(Duration::from_secs(1), task);
        clock.advance(Duration::from_secs(2));
        timer.cancel();
        timer.cancel();
        clock.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let clock = ManualClock::new();
        let (count, task) = counter();
        drop(clock.every(Duration::from_secs(1), task));
        clock.advance(Duration::from_secs(3));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_sees_its_own_deadline() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (inner_clock, inner_seen) = (clock.clone(), Arc::clone(&seen));
        let _timer = clock.every(
            Duration::from_secs(60),
            Arc::new(move || inner_seen.lock().unwrap().push(inner_clock.now())),
        );

        clock.advance(Duration::from_secs(130));
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![t0 + Duration::from_secs(60), t0 + Duration::from_secs(120)]
        );
        assert_eq!(clock.now(), t0 + Duration::from_secs(130));
    }
}
