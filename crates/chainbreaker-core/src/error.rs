//! Breaker error types.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the breaker's helpers.
///
/// Recording outcomes and reading state never fail; these variants exist for
/// callers that want a ready-made "service unavailable" error and for
/// configuration parsing.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The circuit is open; the dependency must not be called.
    #[error("Circuit breaker '{}' is open, retry in {}ms", .breaker, .retry_in.as_millis())]
    Open { breaker: String, retry_in: Duration },

    /// Configuration could not be parsed.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl BreakerError {
    /// Returns `true` if this is the open-circuit rejection.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Time left until the circuit probes again, for open-circuit rejections.
    pub fn retry_in(&self) -> Option<Duration> {
        match self {
            Self::Open { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }
}
