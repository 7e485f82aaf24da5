use std::sync::Arc;

use scriptden::clock::ManualClock;
use scriptden::repositories::memory::MemoryStore;
use scriptden::services::rate_limit::RateLimiter;

struct Harness {
    clock: Arc<ManualClock>,
    limiter: RateLimiter,
}

fn harness(start: i64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start));
    let limiter = RateLimiter::new(store, clock.clone());
    Harness { clock, limiter }
}

#[tokio::test]
async fn a_single_slot_window_admits_one_call_until_rollover() {
    // 25 seconds into a 60-second window.
    let h = harness(1_700_000_005);

    let first = h.limiter.consume("k", 60, 1).await.unwrap();
    assert!(first.allowed);
    assert_eq!(first.remaining, 0);
    assert_eq!(first.reset_at, 1_700_000_040);

    h.clock.advance(5);
    let second = h.limiter.consume("k", 60, 1).await.unwrap();
    assert!(!second.allowed);
    assert_eq!(second.reset_at, 1_700_000_040);
    assert_eq!(h.limiter.seconds_until(second.reset_at), 30);

    // Crossing the boundary reopens the budget.
    h.clock.set(1_700_000_040);
    let rolled = h.limiter.consume("k", 60, 1).await.unwrap();
    assert!(rolled.allowed);
    assert_eq!(rolled.reset_at, 1_700_000_100);
}

#[tokio::test]
async fn exactly_limit_calls_fit_in_one_window() {
    let h = harness(0);

    for n in 1..=5 {
        let decision = h.limiter.consume("k", 60, 5).await.unwrap();
        assert!(decision.allowed, "call {n} should fit");
        assert_eq!(decision.remaining, 5 - n);
    }

    let over = h.limiter.consume("k", 60, 5).await.unwrap();
    assert!(!over.allowed);
    assert_eq!(over.remaining, 0);
}

#[tokio::test]
async fn concurrent_consumers_share_one_budget() {
    let h = harness(0);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let limiter = h.limiter.clone();
        tasks.spawn(async move { limiter.consume("shared", 60, 4).await.unwrap().allowed });
    }

    let mut allowed = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            allowed += 1;
        }
    }

    // The upsert is atomic: every caller sees a distinct count, so exactly
    // the limit gets through no matter the interleaving.
    assert_eq!(allowed, 4);
}

#[tokio::test]
async fn a_boundary_burst_admits_at_most_twice_the_limit() {
    // The documented fixed-window tradeoff: a budget at the end of one
    // window plus a fresh budget at the start of the next.
    let h = harness(59);

    let mut total = 0;
    for _ in 0..8 {
        if h.limiter.consume("b", 60, 3).await.unwrap().allowed {
            total += 1;
        }
    }
    assert_eq!(total, 3);

    h.clock.set(60);
    for _ in 0..8 {
        if h.limiter.consume("b", 60, 3).await.unwrap().allowed {
            total += 1;
        }
    }
    assert_eq!(total, 6);
}

#[tokio::test]
async fn peek_reports_the_budget_without_spending_it() {
    let h = harness(0);

    let untouched = h.limiter.peek("p", 60, 2).await.unwrap();
    assert!(untouched.allowed);
    assert_eq!(untouched.remaining, 2);

    // Peeking twice changes nothing.
    let again = h.limiter.peek("p", 60, 2).await.unwrap();
    assert_eq!(again.remaining, 2);

    h.limiter.consume("p", 60, 2).await.unwrap();
    let after_one = h.limiter.peek("p", 60, 2).await.unwrap();
    assert!(after_one.allowed);
    assert_eq!(after_one.remaining, 1);

    h.limiter.consume("p", 60, 2).await.unwrap();
    let full = h.limiter.peek("p", 60, 2).await.unwrap();
    assert!(!full.allowed);
    assert_eq!(full.remaining, 0);

    // A stale counter from a previous window reads as a whole budget.
    h.clock.set(60);
    let fresh = h.limiter.peek("p", 60, 2).await.unwrap();
    assert!(fresh.allowed);
    assert_eq!(fresh.remaining, 2);
}

#[tokio::test]
async fn keys_do_not_interfere() {
    let h = harness(0);

    assert!(h.limiter.consume("a", 60, 1).await.unwrap().allowed);
    assert!(!h.limiter.consume("a", 60, 1).await.unwrap().allowed);

    // A different key has its own counter.
    assert!(h.limiter.consume("b", 60, 1).await.unwrap().allowed);
}
