//! Periodic breaker state reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainbreaker_core::{BreakerSnapshot, CircuitBreaker, CircuitState};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Emit one structured event describing `snapshot`.
///
/// Open circuits are logged at `warn`, everything else at `info`.
pub fn log_snapshot(snapshot: &BreakerSnapshot) {
    let retry_in_ms = snapshot.retry_in.map_or(0, |d| d.as_millis() as u64);
    match snapshot.state {
        CircuitState::Open => tracing::warn!(
            breaker = %snapshot.name,
            state = %snapshot.state,
            retry_in_ms,
            "circuit breaker report"
        ),
        _ => tracing::info!(
            breaker = %snapshot.name,
            state = %snapshot.state,
            error_rate = snapshot.error_rate,
            evaluated = snapshot.evaluated_total(),
            active = snapshot.active_total(),
            trial_successes = snapshot.trial_successes,
            "circuit breaker report"
        ),
    }
}

/// Background task that logs a breaker snapshot every `interval`.
///
/// Runs on the current tokio runtime. The task is aborted on
/// [`shutdown`](Self::shutdown) or drop.
pub struct SnapshotReporter {
    handle: JoinHandle<()>,
    reports: Arc<AtomicU64>,
}

impl SnapshotReporter {
    /// Start reporting. The first report is logged immediately.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(breaker: CircuitBreaker, interval: Duration) -> Self {
        let reports = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&reports);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                log_snapshot(&breaker.inspect());
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        tracing::debug!(interval_ms = period.as_millis() as u64, "snapshot reporter started");
        Self { handle, reports }
    }

    /// Number of reports logged so far.
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop reporting and wait for the task to wind down.
    pub async fn shutdown(self) {
        let mut this = self;
        this.handle.abort();
        let _ = (&mut this.handle).await;
    }
}

impl Drop for SnapshotReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
