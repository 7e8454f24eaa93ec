//! Evaluation buffer: a fixed ring of time buckets.
//!
//! The buffer holds `nodes + 1` buckets. Exactly one of them, the bucket at
//! the cursor, is active and receives new outcomes; the other `nodes` are the
//! evaluation window. Advancing moves the cursor to `(cursor + 1) % len` and
//! resets the bucket it lands on, so the oldest evaluated bucket becomes the
//! new active one.

use std::time::{Duration, Instant};

use crate::breaker::Outcome;
use crate::config::MAX_NODES;

/// One time-bounded success/failure accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    expires_at: Option<Instant>,
    failure_count: u64,
    success_count: u64,
}

impl Bucket {
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn total(&self) -> u64 {
        self.failure_count + self.success_count
    }

    /// End of this bucket's span; `None` if it has not been active since the
    /// buffer was created or cleared.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// `true` once the bucket has been active at least once since the last clear.
    pub fn is_populated(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success_count += 1,
            Outcome::Failure => self.failure_count += 1,
        }
    }

    fn reset(&mut self, expires_at: Instant) {
        self.expires_at = Some(expires_at);
        self.failure_count = 0;
        self.success_count = 0;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Ring of [`Bucket`]s with one active slot.
#[derive(Debug, Clone)]
pub struct EvaluationBuffer {
    buckets: Vec<Bucket>,
    cursor: usize,
    span: Duration,
}

impl EvaluationBuffer {
    /// Create a buffer evaluating `nodes` buckets of `span` each. Bucket 0 is
    /// active from `now`. `nodes` is clamped to `1..=MAX_NODES`.
    pub fn new(nodes: usize, span: Duration, now: Instant) -> Self {
        let mut buffer = Self {
            buckets: vec![Bucket::default(); nodes.clamp(1, MAX_NODES) + 1],
            cursor: 0,
            span,
        };
        buffer.restart(now);
        buffer
    }

    /// Total bucket count, active bucket included.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Index of the active bucket.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn active(&self) -> &Bucket {
        &self.buckets[self.cursor]
    }

    pub fn active_bucket(&mut self) -> &mut Bucket {
        &mut self.buckets[self.cursor]
    }

    /// Move to the next slot and reset it to span `now..now + span`.
    pub fn advance(&mut self, now: Instant) {
        self.cursor = (self.cursor + 1) % self.buckets.len();
        let expires_at = now + self.span;
        self.buckets[self.cursor].reset(expires_at);
    }

    /// The non-active buckets, oldest first.
    pub fn evaluable(&self) -> impl Iterator<Item = &Bucket> + '_ {
        let len = self.buckets.len();
        (1..len).map(move |offset| &self.buckets[(self.cursor + offset) % len])
    }

    /// Call `f` once per non-active bucket, oldest first.
    pub fn for_each_evaluable(&self, f: impl FnMut(&Bucket)) {
        self.evaluable().for_each(f);
    }

    /// All buckets in slot order.
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Reset every bucket, the active one included, to the never-populated state.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Bucket::clear);
    }

    /// Return the cursor to slot 0 and open a fresh active bucket there.
    pub fn restart(&mut self, now: Instant) {
        self.cursor = 0;
        let expires_at = now + self.span;
        self.buckets[0].reset(expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN: Duration = Duration::from_secs(60);

    fn fill(buffer: &mut EvaluationBuffer, failures: u64, successes: u64) {
        for _ in 0..failures {
            buffer.active_bucket().record(Outcome::Failure);
        }
        for _ in 0..successes {
            buffer.active_bucket().record(Outcome::Success);
        }
    }

    #[test]
    fn holds_one_extra_bucket() {
        let buffer = EvaluationBuffer::new(3, SPAN, Instant::now());
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.evaluable().count(), 3);
        assert_eq!(EvaluationBuffer::new(0, SPAN, Instant::now()).len(), 2);
        assert_eq!(
            EvaluationBuffer::new(usize::MAX, SPAN, Instant::now()).len(),
            MAX_NODES + 1
        );
    }

    #[test]
    fn active_bucket_opens_immediately() {
        let now = Instant::now();
        let buffer = EvaluationBuffer::new(3, SPAN, now);
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.active().expires_at(), Some(now + SPAN));
        assert!(buffer.evaluable().all(|b| !b.is_populated()));
    }

    #[test]
    fn records_land_in_active_bucket() {
        let mut buffer = EvaluationBuffer::new(3, SPAN, Instant::now());
        fill(&mut buffer, 2, 5);
        assert_eq!(buffer.active().failure_count(), 2);
        assert_eq!(buffer.active().success_count(), 5);
        assert_eq!(buffer.active().total(), 7);
    }

    #[test]
    fn advance_wraps_and_resets() {
        let t0 = Instant::now();
        let mut buffer = EvaluationBuffer::new(2, SPAN, t0);
        fill(&mut buffer, 1, 1);
        buffer.advance(t0 + SPAN);
        assert_eq!(buffer.cursor(), 1);
        assert_eq!(buffer.active().total(), 0);
        assert_eq!(buffer.active().expires_at(), Some(t0 + SPAN * 2));
        // the previously active bucket is now evaluated
        assert_eq!(buffer.evaluable().map(Bucket::total).sum::<u64>(), 2);

        buffer.advance(t0 + SPAN * 2);
        buffer.advance(t0 + SPAN * 3);
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.active().total(), 0, "slot 0 reset on reuse");
    }

    #[test]
    fn evaluable_skips_active_oldest_first() {
        let t0 = Instant::now();
        let mut buffer = EvaluationBuffer::new(3, SPAN, t0);
        for (i, n) in [1u64, 2, 3, 4].into_iter().enumerate() {
            fill(&mut buffer, 0, n);
            buffer.advance(t0 + SPAN * (i as u32 + 1));
        }
        // cursor back at 0; slots 1..=3 hold 2, 3, 4
        let mut seen = Vec::new();
        buffer.for_each_evaluable(|b| seen.push(b.success_count()));
        assert_eq!(seen, vec![2, 3, 4]);
    }

    #[test]
    fn clear_empties_every_bucket() {
        let t0 = Instant::now();
        let mut buffer = EvaluationBuffer::new(2, SPAN, t0);
        fill(&mut buffer, 3, 3);
        buffer.advance(t0 + SPAN);
        fill(&mut buffer, 1, 0);

        buffer.clear();
        assert!(buffer.buckets().iter().all(|b| b.total() == 0 && !b.is_populated()));

        buffer.restart(t0 + SPAN * 5);
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.active().expires_at(), Some(t0 + SPAN * 6));
    }
}
