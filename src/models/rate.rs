/// A rate-counter row as stored: events seen in the current fixed window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateCounter {
    /// Events observed in the window starting at `window_start`.
    pub count: i64,
    /// Unix seconds at which the current window began.
    pub window_start: i64,
}

/// The outcome of a rate-limit check.
#[derive(Clone, Debug)]
pub struct RateDecision {
    /// Whether the event fits inside the limit.
    pub allowed: bool,
    /// Events still available in this window, never negative.
    pub remaining: i64,
    /// Unix seconds at which the window rolls over and the count resets.
    pub reset_at: i64,
}
