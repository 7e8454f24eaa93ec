//! Three-state circuit breaker driven by a sliding error-rate window.
//!
//! State transitions:
//! - `Closed` → `Open`:      on a bucket-advance tick, the window's error rate
//!                           exceeds `error_threshold`
//! - `Open` → `Half-Open`:   the retry timer fires after `retry_timeout`
//! - `Half-Open` → `Closed`: `trial_successes_required` consecutive successes
//! - `Half-Open` → `Open`:   any failure; the retry timer restarts in full
//!
//! The threshold is only checked when the window advances, never inside
//! `record`, so the admission decision changes at bucket boundaries only.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::buffer::EvaluationBuffer;
use crate::builder::CircuitBreakerBuilder;
use crate::clock::Clock;
use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::estimator;
use crate::scheduler::{Scheduler, Tick};
use crate::snapshot::{BreakerSnapshot, BucketInfo};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation; outcomes feed the evaluation window.
    Closed,
    /// Calls rejected until the retry timer fires.
    Open,
    /// Trial calls allowed; outcomes decide between Closed and Open.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Result of one call to the protected dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Failure,
        }
    }
}

impl<T, E> From<&Result<T, E>> for Outcome {
    fn from(result: &Result<T, E>) -> Self {
        Self::from_result(result)
    }
}

struct Inner {
    state: CircuitState,
    buffer: EvaluationBuffer,
    error_rate: f64,
    trial_successes: u32,
    retry_after: Option<Instant>,
}

struct Shared {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    advance: Scheduler,
    retry: Scheduler,
}

/// Thread-safe sliding-window circuit breaker.
///
/// Cloning yields another handle to the same breaker. Both timers stop when
/// the last handle is dropped.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Start configuring a breaker.
    pub fn builder() -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new()
    }

    /// Create a breaker in `Closed` state with its bucket timer running.
    /// `config` is normalised first.
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.normalized();
        let now = clock.now();
        let buffer = EvaluationBuffer::new(config.nodes, config.bucket_span(), now);

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let on_advance = {
                let weak = weak.clone();
                move |tick: Tick| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_advance_tick(tick);
                    }
                }
            };
            let on_retry = {
                let weak = weak.clone();
                move |tick: Tick| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_retry_tick(tick);
                    }
                }
            };

            Shared {
                advance: Scheduler::new(Arc::clone(&clock), config.bucket_span(), on_advance),
                retry: Scheduler::new(Arc::clone(&clock), config.retry_timeout(), on_retry),
                inner: Mutex::new(Inner {
                    state: CircuitState::Closed,
                    buffer,
                    error_rate: 0.0,
                    trial_successes: 0,
                    retry_after: None,
                }),
                clock,
                config,
            }
        });

        {
            // Arm under the lock so a first tick cannot observe a half-built breaker.
            let _inner = shared.lock();
            shared.advance.start();
        }
        tracing::debug!(
            breaker = %shared.config.name,
            nodes = shared.config.nodes,
            bucket_span_ms = shared.config.bucket_span_ms,
            "circuit breaker created"
        );

        Self { shared }
    }

    /// Record the outcome of one call.
    ///
    /// - `Closed`: counted in the active bucket
    /// - `Open`: ignored
    /// - `HalfOpen`: a success counts towards closing, a failure reopens
    pub fn record(&self, outcome: Outcome) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => inner.buffer.active_bucket().record(outcome),
            CircuitState::Open => {}
            CircuitState::HalfOpen => match outcome {
                Outcome::Success => {
                    inner.trial_successes += 1;
                    if inner.trial_successes >= shared.config.trial_successes_required {
                        shared.close(&mut inner);
                    }
                }
                Outcome::Failure => {
                    tracing::warn!(
                        breaker = %shared.config.name,
                        trial_successes = inner.trial_successes,
                        "Circuit breaker trial failed → open"
                    );
                    shared.open(&mut inner);
                }
            },
        }
    }

    /// Record `Ok` as a success and `Err` as a failure.
    pub fn record_result<T, E>(&self, result: &Result<T, E>) {
        self.record(Outcome::from_result(result));
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.shared.lock().state
    }

    /// Error rate computed at the last bucket advance, in percent. `0.0` while
    /// the window holds too little data and right after the circuit opens.
    pub fn error_rate(&self) -> f64 {
        self.shared.lock().error_rate
    }

    /// `true` unless the circuit is open.
    pub fn is_allowed(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// `Ok(())` if a call may proceed, otherwise [`BreakerError::Open`] with
    /// the time left until the next probe.
    pub fn check(&self) -> Result<(), BreakerError> {
        let shared = &self.shared;
        let inner = shared.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }
        let now = shared.clock.now();
        Err(BreakerError::Open {
            breaker: shared.config.name.clone(),
            retry_in: inner
                .retry_after
                .map(|at| at.saturating_duration_since(now))
                .unwrap_or_default(),
        })
    }

    /// Effective (normalised) configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.shared.config
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Full consistent snapshot for diagnostics. Walks the whole buffer; keep
    /// it off the request path.
    pub fn inspect(&self) -> BreakerSnapshot {
        let shared = &self.shared;
        let inner = shared.lock();
        let now = shared.clock.now();
        let span = inner.buffer.span();

        let buckets = inner
            .buffer
            .buckets()
            .iter()
            .map(|bucket| BucketInfo {
                failure_count: bucket.failure_count(),
                success_count: bucket.success_count(),
                expires_in: bucket.expires_at().map(|at| at.saturating_duration_since(now)),
            })
            .collect();
        let elapsed_in_span = inner
            .buffer
            .active()
            .expires_at()
            .map(|at| span.saturating_sub(at.saturating_duration_since(now)));

        BreakerSnapshot {
            name: shared.config.name.clone(),
            state: inner.state,
            error_rate: inner.error_rate,
            buckets,
            active: inner.buffer.cursor(),
            elapsed_in_span,
            trial_successes: inner.trial_successes,
            retry_in: inner.retry_after.map(|at| at.saturating_duration_since(now)),
            config: shared.config.clone(),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.config.name)
            .field("state", &inner.state)
            .field("error_rate", &inner.error_rate)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_advance_tick(&self, tick: Tick) {
        let mut inner = self.lock();
        if !self.advance.is_current(tick) || inner.state != CircuitState::Closed {
            tracing::trace!(breaker = %self.config.name, "stale bucket tick dropped");
            return;
        }

        let now = self.clock.now();
        inner.buffer.advance(now);
        inner.error_rate = estimator::error_rate(&inner.buffer, self.config.min_eval_size);
        tracing::debug!(
            breaker = %self.config.name,
            cursor = inner.buffer.cursor(),
            error_rate = inner.error_rate,
            "evaluation window advanced"
        );

        if inner.error_rate > self.config.error_threshold {
            tracing::warn!(
                breaker = %self.config.name,
                error_rate = inner.error_rate,
                threshold = self.config.error_threshold,
                "Circuit breaker → open"
            );
            self.open(&mut inner);
        }
    }

    fn on_retry_tick(&self, tick: Tick) {
        let mut inner = self.lock();
        if !self.retry.is_current(tick) || inner.state != CircuitState::Open {
            tracing::trace!(breaker = %self.config.name, "stale retry tick dropped");
            return;
        }

        self.retry.stop();
        inner.state = CircuitState::HalfOpen;
        inner.trial_successes = 0;
        inner.retry_after = None;
        tracing::info!(breaker = %self.config.name, "Circuit breaker → half-open");
    }

    /// Enter `Open`: freeze the window, drop its data, arm a full retry timeout.
    fn open(&self, inner: &mut Inner) {
        self.advance.stop();
        inner.state = CircuitState::Open;
        inner.buffer.clear();
        inner.error_rate = 0.0;
        inner.trial_successes = 0;
        inner.retry_after = Some(self.clock.now() + self.config.retry_timeout());
        self.retry.stop();
        self.retry.start();
    }

    /// Enter `Closed`: resume with a cold window.
    fn close(&self, inner: &mut Inner) {
        self.retry.stop();
        inner.state = CircuitState::Closed;
        inner.trial_successes = 0;
        inner.retry_after = None;
        inner.error_rate = 0.0;
        inner.buffer.clear();
        inner.buffer.restart(self.clock.now());
        self.advance.start();
        tracing::info!(breaker = %self.config.name, "Circuit breaker → closed");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.advance.stop();
        self.retry.stop();
    }
}
