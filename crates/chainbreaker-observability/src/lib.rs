//! # chainbreaker-observability
//!
//! Structured logging and periodic state reporting for chainbreaker.
//!
//! ## Structured logging
//! Every breaker event carries a `breaker` field naming the dependency.
//! Logs can be emitted as text or JSON (ELK, Loki, CloudWatch) and the level
//! is configurable per component.
//!
//! ## Snapshot reporting
//! [`SnapshotReporter`] logs a breaker's state, error rate and window totals
//! at a fixed interval on the tokio runtime.

pub mod reporter;
pub mod tracing_setup;

pub use reporter::{log_snapshot, SnapshotReporter};
pub use tracing_setup::{init_tracing, LogConfig};
