//! Weighted round-robin fairness scheduler for the queue pool.
//!
//! A token ring is pre-populated with queue-index tokens in proportion to
//! the configured weights and shuffled once at construction. Drawing a
//! token rotates the ring, so long-run service proportions approximate
//! the weights without any per-draw randomness.

use rand::seq::SliceRandom;

/// Weighted scheduler over a fixed set of queues.
///
/// Not internally synchronized: the owning pool guards it (together with
/// the retirement marker) behind a single mutex.
#[derive(Debug)]
pub(crate) struct FairScheduler {
    /// Ring of queue indices; drawing pops the front and pushes it back.
    tokens: std::collections::VecDeque<usize>,
    /// Number of retired queues. Queues retire strictly in index order,
    /// so indices below this marker no longer receive service.
    retired: usize,
}

impl FairScheduler {
    /// Build a scheduler for `weights.len()` queues, seeding
    /// `weights[i]` tokens for queue `i` and shuffling the ring once.
    pub(crate) fn new(weights: &[usize]) -> Self {
        let mut seed: Vec<usize> = Vec::with_capacity(weights.iter().sum());
        for (queue, &weight) in weights.iter().enumerate() {
            seed.extend(std::iter::repeat(queue).take(weight));
        }
        seed.shuffle(&mut rand::thread_rng());

        Self {
            tokens: seed.into(),
            retired: 0,
        }
    }

    /// Draw the next queue index to serve.
    ///
    /// Tokens of retired queues are rotated past without being served.
    /// Once every queue is retired the last index is returned as a
    /// harmless fallback; the pool is draining at that point and pops
    /// will simply time out.
    pub(crate) fn next(&mut self) -> usize {
        let len = self.tokens.len();
        for _ in 0..len {
            if let Some(token) = self.tokens.pop_front() {
                self.tokens.push_back(token);
                if token >= self.retired {
                    return token;
                }
            }
        }
        self.queue_count().saturating_sub(1)
    }

    /// Retire a queue: permanently stop routing tokens to it.
    ///
    /// Retirement is monotonic and strictly index-ordered — only the
    /// queue currently holding the "next to finish" marker can retire,
    /// and the marker only moves forward. Out-of-order or repeated calls
    /// are no-ops. Returns whether the marker advanced.
    pub(crate) fn mark_exhausted(&mut self, queue: usize) -> bool {
        if queue == self.retired && queue < self.queue_count() {
            self.retired += 1;
            true
        } else {
            false
        }
    }

    /// Whether the given queue has been retired.
    #[cfg(test)]
    pub(crate) fn is_retired(&self, queue: usize) -> bool {
        queue < self.retired
    }

    fn queue_count(&self) -> usize {
        self.tokens.iter().copied().max().map_or(0, |m| m + 1)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_proportions_follow_weights() {
        let mut sched = FairScheduler::new(&[15, 1]);

        let mut counts = [0usize; 2];
        let draws = 1600;
        for _ in 0..draws {
            counts[sched.next()] += 1;
        }

        // The ring makes proportions near-exact over whole rotations, but
        // assert with tolerance: the split must be close to 15:1.
        let fresh_share = counts[0] as f64 / draws as f64;
        assert!(
            (fresh_share - 15.0 / 16.0).abs() < 0.02,
            "fresh share was {:.3}, expected ~0.9375 (counts: {:?})",
            fresh_share,
            counts
        );
        assert!(counts[1] > 0, "retry queue must still receive service");
    }

    #[test]
    fn retired_queue_receives_no_further_tokens() {
        let mut sched = FairScheduler::new(&[3, 1]);
        assert!(sched.mark_exhausted(0));

        for _ in 0..32 {
            assert_eq!(sched.next(), 1, "retired queue must be skipped");
        }
    }

    #[test]
    fn retirement_is_monotonic_and_index_ordered() {
        let mut sched = FairScheduler::new(&[2, 2]);

        // Queue 1 cannot retire before queue 0
        assert!(!sched.mark_exhausted(1));
        assert!(!sched.is_retired(1));

        assert!(sched.mark_exhausted(0));
        assert!(sched.is_retired(0));
        // Repeated marks are no-ops
        assert!(!sched.mark_exhausted(0));

        assert!(sched.mark_exhausted(1));
        assert!(sched.is_retired(1));
    }

    #[test]
    fn all_queues_retired_still_yields_an_index() {
        let mut sched = FairScheduler::new(&[1, 1]);
        sched.mark_exhausted(0);
        sched.mark_exhausted(1);
        // Fallback keeps pollers alive while the pool drains
        assert_eq!(sched.next(), 1);
    }

    #[test]
    fn every_weighted_queue_appears_in_one_rotation() {
        let mut sched = FairScheduler::new(&[15, 1]);
        let mut seen = [false; 2];
        for _ in 0..16 {
            seen[sched.next()] = true;
        }
        assert!(seen[0] && seen[1], "one full rotation serves every queue");
    }
}
