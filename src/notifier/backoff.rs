//! Jittered exponential backoff for the opt-in retry policy.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

const MIN_SLEEP_MS: u64 = 10;

/// Tracks consecutive failures of one payload and produces sleep delays.
pub(super) struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    failure_since: Option<Instant>,
    rng: StdRng,
}

impl BackoffState {
    pub(super) fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            failure_since: None,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Forget earlier failures; called before each new payload.
    pub(super) fn reset(&mut self) {
        self.current = self.policy.base;
        self.failure_since = None;
    }

    /// Delay before the next attempt, or `None` once the deadline passed.
    pub(super) fn next_sleep(&mut self, now: Instant) -> Option<Duration> {
        let start = *self.failure_since.get_or_insert(now);
        let elapsed = now.duration_since(start);
        if elapsed >= self.policy.deadline {
            return None;
        }
        if now != start {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }

        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        let remaining = self.policy.deadline - elapsed;
        Some(Duration::from_millis(sleep_ms).min(remaining))
    }
}
