//! Fluent builder for [`CircuitBreaker`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use chainbreaker_core::CircuitBreaker;
//!
//! // 5 minutes evaluated as 5 one-minute buckets
//! let breaker = CircuitBreaker::builder()
//!     .name("payments")
//!     .eval_window(Duration::from_secs(300), 5)
//!     .min_eval_size(50)
//!     .error_threshold(20.0)
//!     .retry_timeout(Duration::from_secs(30))
//!     .trial_successes_required(10)
//!     .build();
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::config::{BreakerConfig, DEFAULT_BUCKET_SPAN_MS, DEFAULT_EVAL_WINDOW, MAX_NODES};

/// Fluent builder for a [`CircuitBreaker`].
#[derive(Default)]
pub struct CircuitBreakerBuilder {
    config: BreakerConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl CircuitBreakerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one loaded from a file).
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Name used in logs and errors.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Evaluate `window` of history split into `nodes` buckets.
    ///
    /// A zero `window` falls back to 10 minutes. Zero `nodes` falls back to
    /// one-minute buckets, as many as the window needs up to
    /// [`MAX_NODES`](crate::config::MAX_NODES).
    pub fn eval_window(mut self, window: Duration, nodes: usize) -> Self {
        let window = if window.is_zero() { DEFAULT_EVAL_WINDOW } else { window };
        let window_ms = millis_ceil(window);

        if nodes == 0 {
            self.config.bucket_span_ms = DEFAULT_BUCKET_SPAN_MS;
            self.config.nodes = usize::try_from(window_ms.div_ceil(DEFAULT_BUCKET_SPAN_MS))
                .unwrap_or(usize::MAX)
                .clamp(1, MAX_NODES);
        } else {
            self.config.bucket_span_ms = (window_ms / nodes as u64).max(1);
            self.config.nodes = nodes;
        }
        self
    }

    /// Span of a single bucket; also the advance interval. Rounded up to
    /// whole milliseconds.
    pub fn bucket_span(mut self, span: Duration) -> Self {
        self.config.bucket_span_ms = millis_ceil(span);
        self
    }

    /// Number of evaluated buckets.
    pub fn nodes(mut self, nodes: usize) -> Self {
        self.config.nodes = nodes;
        self
    }

    pub fn min_eval_size(mut self, size: u64) -> Self {
        self.config.min_eval_size = size;
        self
    }

    /// Error rate, in percent (0–100), above which the circuit opens.
    pub fn error_threshold(mut self, threshold: f64) -> Self {
        self.config.error_threshold = threshold;
        self
    }

    /// Cooling-off period in `Open` before probing. Rounded up to whole
    /// milliseconds.
    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.config.retry_timeout_ms = millis_ceil(timeout);
        self
    }

    pub fn trial_successes_required(mut self, n: u32) -> Self {
        self.config.trial_successes_required = n;
        self
    }

    /// Replace the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// The normalised config the breaker would be built with.
    pub fn build_config(&self) -> BreakerConfig {
        self.config.clone().normalized()
    }

    pub fn build(self) -> CircuitBreaker {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        CircuitBreaker::new(self.config, clock)
    }
}

/// Whole milliseconds in `d`, rounded up, so only a true zero stays zero.
fn millis_ceil(d: Duration) -> u64 {
    u64::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
