//! Read-only breaker snapshots for monitoring and visualisation.

use std::time::Duration;

use serde::Serialize;

use crate::breaker::CircuitState;
use crate::config::BreakerConfig;

/// Counters of one bucket at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub failure_count: u64,
    pub success_count: u64,
    /// Time left in the bucket's span; zero once past, `None` if the bucket
    /// has not been active since the last clear.
    pub expires_in: Option<Duration>,
}

impl BucketInfo {
    pub fn total(&self) -> u64 {
        self.failure_count + self.success_count
    }
}

/// Consistent view of a breaker, taken under its lock.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Cached error rate, in percent.
    pub error_rate: f64,
    /// Every bucket in slot order, active one included.
    pub buckets: Vec<BucketInfo>,
    /// Index of the active bucket in `buckets`.
    pub active: usize,
    /// Time since the active bucket opened; `None` while the window is cleared.
    pub elapsed_in_span: Option<Duration>,
    pub trial_successes: u32,
    /// Time until the next Half-Open probe; only set while `Open`.
    pub retry_in: Option<Duration>,
    pub config: BreakerConfig,
}

impl BreakerSnapshot {
    /// Outcomes currently in the evaluation window (active bucket excluded).
    pub fn evaluated_total(&self) -> u64 {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.active)
            .map(|(_, b)| b.total())
            .sum()
    }

    /// Outcomes recorded into the active bucket so far.
    pub fn active_total(&self) -> u64 {
        self.buckets.get(self.active).map_or(0, BucketInfo::total)
    }
}
