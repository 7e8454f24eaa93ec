//! chainbreaker-core: a sliding-window circuit breaker for unreliable dependencies.
//!
//! # Overview
//!
//! A [`CircuitBreaker`] watches the outcome of every call made to one
//! dependency and answers a single question: may the next call proceed?
//!
//! ```text
//! record(outcome) → active bucket ─┐
//!                                  │  every bucket span (Scheduler)
//!                                  ▼
//!            EvaluationBuffer.advance() → estimator::error_rate()
//!                                  │
//!                  rate > threshold?  ──yes──► Open ──retry timeout──► HalfOpen
//!                                                 ▲                      │
//!                                                 └──── any failure ─────┤
//!                                       N consecutive successes ──► Closed
//! ```
//!
//! - [`Clock`]: time source and periodic timers ([`SystemClock`], [`ManualClock`])
//! - [`Scheduler`]: restartable periodic callback with stale-tick protection
//! - [`EvaluationBuffer`]: ring of time buckets, one active
//! - [`estimator`]: error rate over the non-active buckets
//! - [`CircuitBreaker`]: the state machine facade
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use chainbreaker_core::{CircuitBreaker, Outcome};
//!
//! let breaker = CircuitBreaker::builder()
//!     .name("pricing-api")
//!     .eval_window(Duration::from_secs(300), 5)
//!     .error_threshold(25.0)
//!     .build();
//!
//! if breaker.check().is_ok() {
//!     let result: Result<(), String> = Ok(());
//!     breaker.record(Outcome::from_result(&result));
//! }
//! ```

pub mod breaker;
pub mod buffer;
pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod scheduler;
pub mod snapshot;

pub use breaker::{CircuitBreaker, CircuitState, Outcome};
pub use buffer::{Bucket, EvaluationBuffer};
pub use builder::CircuitBreakerBuilder;
pub use clock::{Clock, ManualClock, SystemClock, TickFn, Timer, TimerHandle};
pub use config::BreakerConfig;
pub use error::BreakerError;
pub use scheduler::{Scheduler, Tick};
pub use snapshot::{BreakerSnapshot, BucketInfo};
