//! Breaker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BreakerError;

/// Default evaluated bucket count.
pub const DEFAULT_NODES: usize = 10;
/// Default bucket span (1 minute).
pub const DEFAULT_BUCKET_SPAN_MS: u64 = 60_000;
/// Default evaluation window used by `eval_window` when given a zero window.
pub const DEFAULT_EVAL_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Default minimum number of evaluated outcomes.
pub const DEFAULT_MIN_EVAL_SIZE: u64 = 100;
/// Default error-rate threshold, in percent.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 10.0;
/// Default Open → Half-Open delay (1 minute).
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 60_000;
/// Default consecutive Half-Open successes needed to close.
pub const DEFAULT_TRIAL_SUCCESSES: u32 = 20;
/// Largest evaluated bucket count; larger values are clamped.
pub const MAX_NODES: usize = 10_000;
/// Longest bucket span or retry timeout (one year); larger values are clamped.
pub const MAX_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1_000;

/// Configuration for one [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Name used in log events and errors (e.g. the dependency's host).
    pub name: String,
    /// Span of wall-clock time each bucket covers, in milliseconds.
    pub bucket_span_ms: u64,
    /// Number of evaluated buckets. The buffer holds one more (the active one).
    pub nodes: usize,
    /// Minimum number of evaluated outcomes before a non-zero rate is reported.
    pub min_eval_size: u64,
    /// Error rate, in percent, above which the circuit opens.
    pub error_threshold: f64,
    /// How long the circuit stays open before probing, in milliseconds.
    pub retry_timeout_ms: u64,
    /// Consecutive Half-Open successes required to close the circuit.
    pub trial_successes_required: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            bucket_span_ms: DEFAULT_BUCKET_SPAN_MS,
            nodes: DEFAULT_NODES,
            min_eval_size: DEFAULT_MIN_EVAL_SIZE,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            retry_timeout_ms: DEFAULT_RETRY_TIMEOUT_MS,
            trial_successes_required: DEFAULT_TRIAL_SUCCESSES,
        }
    }
}

impl BreakerConfig {
    /// Parse a JSON config; missing fields take their defaults and the result
    /// is normalised.
    pub fn from_json(json: &str) -> Result<Self, BreakerError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    pub fn bucket_span(&self) -> Duration {
        Duration::from_millis(self.bucket_span_ms)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    /// Total evaluated span: `nodes × bucket_span`.
    pub fn eval_window(&self) -> Duration {
        Duration::from_millis(self.bucket_span_ms.saturating_mul(self.nodes as u64))
    }

    /// Replace out-of-range values with safe defaults:
    /// - zero span or zero retry timeout → 1 minute
    /// - zero nodes → 10, more than [`MAX_NODES`] → [`MAX_NODES`]
    /// - span and retry timeout capped at [`MAX_DURATION_MS`]
    /// - NaN threshold → 10 %, otherwise clamped to `0..=100`
    /// - zero trial successes → 1
    pub fn normalized(mut self) -> Self {
        if self.bucket_span_ms == 0 {
            self.bucket_span_ms = DEFAULT_BUCKET_SPAN_MS;
        }
        self.bucket_span_ms = self.bucket_span_ms.min(MAX_DURATION_MS);
        if self.nodes == 0 {
            self.nodes = DEFAULT_NODES;
        }
        self.nodes = self.nodes.min(MAX_NODES);
        self.error_threshold = if self.error_threshold.is_nan() {
            DEFAULT_ERROR_THRESHOLD
        } else {
            self.error_threshold.clamp(0.0, 100.0)
        };
        if self.retry_timeout_ms == 0 {
            self.retry_timeout_ms = DEFAULT_RETRY_TIMEOUT_MS;
        }
        self.retry_timeout_ms = self.retry_timeout_ms.min(MAX_DURATION_MS);
        if self.trial_successes_required == 0 {
            self.trial_successes_required = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BreakerConfig::default();
        assert_eq!(cfg.bucket_span(), Duration::from_secs(60));
        assert_eq!(cfg.nodes, 10);
        assert_eq!(cfg.eval_window(), Duration::from_secs(600));
        assert_eq!(cfg.min_eval_size, 100);
        assert_eq!(cfg.error_threshold, 10.0);
        assert_eq!(cfg.retry_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.trial_successes_required, 20);
    }

    #[test]
    fn normalizes_out_of_range_values() {
        let cfg = BreakerConfig {
            bucket_span_ms: 0,
            nodes: 0,
            error_threshold: 250.0,
            retry_timeout_ms: 0,
            trial_successes_required: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.bucket_span_ms, DEFAULT_BUCKET_SPAN_MS);
        assert_eq!(cfg.nodes, DEFAULT_NODES);
        assert_eq!(cfg.error_threshold, 100.0);
        assert_eq!(cfg.retry_timeout_ms, DEFAULT_RETRY_TIMEOUT_MS);
        assert_eq!(cfg.trial_successes_required, 1);

        let negative = BreakerConfig { error_threshold: -3.0, ..Default::default() }.normalized();
        assert_eq!(negative.error_threshold, 0.0);
        let nan = BreakerConfig { error_threshold: f64::NAN, ..Default::default() }.normalized();
        assert_eq!(nan.error_threshold, DEFAULT_ERROR_THRESHOLD);
    }

    #[test]
    fn valid_values_untouched() {
        let cfg = BreakerConfig {
            name: "rpc".into(),
            bucket_span_ms: 500,
            nodes: 4,
            min_eval_size: 0,
            error_threshold: 42.5,
            retry_timeout_ms: 1_500,
            trial_successes_required: 3,
        };
        assert_eq!(cfg.clone().normalized(), cfg);
    }

    #[test]
    fn from_json_fills_defaults() {
        let cfg = BreakerConfig::from_json(r#"{"name":"quotes","nodes":3,"retry_timeout_ms":0}"#)
            .unwrap();
        assert_eq!(cfg.name, "quotes");
        assert_eq!(cfg.nodes, 3);
        assert_eq!(cfg.bucket_span_ms, DEFAULT_BUCKET_SPAN_MS);
        assert_eq!(cfg.retry_timeout_ms, DEFAULT_RETRY_TIMEOUT_MS);
    }

    #[test]
    fn oversized_values_are_clamped() {
        let cfg = BreakerConfig::from_json(
            r#"{"nodes":18446744073709551615,"bucket_span_ms":18446744073709551615,"retry_timeout_ms":18446744073709551615}"#,
        )
        .unwrap();
        assert_eq!(cfg.nodes, MAX_NODES);
        assert_eq!(cfg.bucket_span_ms, MAX_DURATION_MS);
        assert_eq!(cfg.retry_timeout_ms, MAX_DURATION_MS);
    }

    #[test]
    fn breaker_builds_from_oversized_config() {
        let cfg = BreakerConfig::from_json(r#"{"nodes":18446744073709551615}"#).unwrap();
        let cb = crate::CircuitBreaker::new(cfg, std::sync::Arc::new(crate::ManualClock::new()));
        assert_eq!(cb.inspect().buckets.len(), MAX_NODES + 1);

        let cfg = BreakerConfig {
            nodes: usize::MAX,
            bucket_span_ms: u64::MAX,
            retry_timeout_ms: u64::MAX,
            ..Default::default()
        };
        let cb = crate::CircuitBreaker::new(cfg, std::sync::Arc::new(crate::ManualClock::new()));
        assert_eq!(cb.state(), crate::CircuitState::Closed);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let err = BreakerConfig::from_json("{nodes: three}").unwrap_err();
        assert!(matches!(err, BreakerError::Deserialization(_)));
    }
}
