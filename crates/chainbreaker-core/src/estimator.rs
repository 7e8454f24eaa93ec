//! Error-rate estimation over the evaluation window.

use crate::buffer::EvaluationBuffer;

/// Percentage of failed outcomes across the non-active buckets, rounded to
/// two decimals.
///
/// Returns `0.0` when the window cannot be trusted yet:
/// - fewer than `min_eval_size` outcomes were evaluated, or none at all
/// - some evaluated bucket has never been active since start or the last clear
pub fn error_rate(buffer: &EvaluationBuffer, min_eval_size: u64) -> f64 {
    let mut failures = 0u64;
    let mut total = 0u64;
    let mut complete = true;

    buffer.for_each_evaluable(|bucket| {
        failures += bucket.failure_count();
        total += bucket.total();
        complete &= bucket.is_populated();
    });

    if !complete || total == 0 || total < min_eval_size {
        return 0.0;
    }

    round_rate(failures as f64 / total as f64 * 100.0)
}

/// Round to two decimal places, halves away from zero.
pub fn round_rate(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::Outcome;
    use std::time::{Duration, Instant};

    const SPAN: Duration = Duration::from_secs(60);

    /// Build a buffer whose evaluated buckets hold `window` (failures, successes).
    fn buffer_with(window: &[(u64, u64)]) -> EvaluationBuffer {
        let t0 = Instant::now();
        let mut buffer = EvaluationBuffer::new(window.len(), SPAN, t0);
        for (i, &(failures, successes)) in window.iter().enumerate() {
            for _ in 0..failures {
                buffer.active_bucket().record(Outcome::Failure);
            }
            for _ in 0..successes {
                buffer.active_bucket().record(Outcome::Success);
            }
            buffer.advance(t0 + SPAN * (i as u32 + 1));
        }
        buffer
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_rate(4.123456), 4.12);
        assert_eq!(round_rate(83.3333), 83.33);
        assert_eq!(round_rate(0.125), 0.13);
        assert_eq!(round_rate(20.0), 20.0);
    }

    #[test]
    fn computes_percentage() {
        let buffer = buffer_with(&[(1, 100), (0, 292), (22, 143)]);
        assert_eq!(error_rate(&buffer, 100), 4.12);
    }

    #[test]
    fn zero_below_min_eval_size() {
        // 100 % failures, but only 50 samples
        let buffer = buffer_with(&[(25, 0), (25, 0)]);
        assert_eq!(error_rate(&buffer, 51), 0.0);
        assert_eq!(error_rate(&buffer, 50), 100.0);
    }

    #[test]
    fn zero_until_every_bucket_populated() {
        let t0 = Instant::now();
        let mut buffer = EvaluationBuffer::new(3, SPAN, t0);
        for _ in 0..500 {
            buffer.active_bucket().record(Outcome::Failure);
        }
        buffer.advance(t0 + SPAN);
        assert_eq!(error_rate(&buffer, 1), 0.0);
        buffer.advance(t0 + SPAN * 2);
        assert_eq!(error_rate(&buffer, 1), 0.0);
        buffer.advance(t0 + SPAN * 3);
        assert_eq!(error_rate(&buffer, 1), 100.0);
    }

    #[test]
    fn active_bucket_never_counted() {
        let mut buffer = buffer_with(&[(0, 10), (0, 10)]);
        for _ in 0..1000 {
            buffer.active_bucket().record(Outcome::Failure);
        }
        assert_eq!(error_rate(&buffer, 1), 0.0);
    }

    #[test]
    fn zero_on_empty_window() {
        let buffer = buffer_with(&[(0, 0), (0, 0)]);
        assert_eq!(error_rate(&buffer, 0), 0.0);
    }
}
