//! Fixed-window rate limiting over a persisted counter per key.
//!
//! A key's counter lives in whichever window `floor(now / window) * window`
//! names; crossing into a new window resets the count to 1 at the store
//! level, atomically with the increment. Fixed windows accept a burst of up
//! to twice the limit straddling a boundary. Stale counters are purged out
//! of band; correctness never depends on deletion.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::rate::{RateCounter, RateDecision};
use crate::repositories::store::RateStore;

/// How long a counter row is kept after its window ends before the
/// maintenance loop may delete it.
pub const COUNTER_RETENTION_SECS: i64 = 86_400;

/// Counts events per key in fixed windows and answers whether each fits.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    pub fn new(store: Arc<dyn RateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records one event for `key` and reports whether it fit inside
    /// `limit` for the current window. `window_seconds` must be positive.
    ///
    /// The store upsert is atomic, so concurrent callers on one key each
    /// see a distinct count and exactly `limit` of them are allowed.
    pub async fn consume(
        &self,
        key: &str,
        window_seconds: i64,
        limit: i64,
    ) -> Result<RateDecision> {
        let window_start = window_start(self.clock.now_unix(), window_seconds);
        let counter = self.store.upsert_counter(key, window_start).await?;
        Ok(decision(&counter, window_seconds, limit))
    }

    /// Reports whether one more event for `key` would fit, without
    /// recording anything.
    ///
    /// Backs checks that gate on past failures but only charge the budget
    /// after the outcome is known, like the failed-login counter.
    pub async fn peek(&self, key: &str, window_seconds: i64, limit: i64) -> Result<RateDecision> {
        let current = window_start(self.clock.now_unix(), window_seconds);
        let reset_at = current + window_seconds;

        match self.store.read_counter(key).await? {
            Some(counter) if counter.window_start == current => Ok(RateDecision {
                allowed: counter.count < limit,
                remaining: (limit - counter.count).max(0),
                reset_at,
            }),
            // No row, or a row from an elapsed window: the budget is whole.
            _ => Ok(RateDecision {
                allowed: true,
                remaining: limit,
                reset_at,
            }),
        }
    }

    /// Seconds from now until `reset_at`, clamped at zero. Feeds the
    /// `Retry-After` header.
    pub fn seconds_until(&self, reset_at: i64) -> i64 {
        (reset_at - self.clock.now_unix()).max(0)
    }
}

fn window_start(now: i64, window_seconds: i64) -> i64 {
    now.div_euclid(window_seconds) * window_seconds
}

fn decision(counter: &RateCounter, window_seconds: i64, limit: i64) -> RateDecision {
    RateDecision {
        allowed: counter.count <= limit,
        remaining: (limit - counter.count).max(0),
        reset_at: counter.window_start + window_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_floors_to_the_window() {
        assert_eq!(window_start(0, 60), 0);
        assert_eq!(window_start(59, 60), 0);
        assert_eq!(window_start(60, 60), 60);
        assert_eq!(window_start(61, 60), 60);
        assert_eq!(window_start(1_699_999_999, 3_600), 1_699_999_200);
    }

    #[test]
    fn window_start_floors_for_pre_epoch_times() {
        assert_eq!(window_start(-1, 60), -60);
        assert_eq!(window_start(-60, 60), -60);
        assert_eq!(window_start(-61, 60), -120);
    }

    #[test]
    fn decision_counts_the_recorded_event_against_the_limit() {
        let at_limit = decision(&RateCounter { count: 5, window_start: 120 }, 60, 5);
        assert!(at_limit.allowed);
        assert_eq!(at_limit.remaining, 0);
        assert_eq!(at_limit.reset_at, 180);

        let over = decision(&RateCounter { count: 6, window_start: 120 }, 60, 5);
        assert!(!over.allowed);
        assert_eq!(over.remaining, 0);
    }
}
