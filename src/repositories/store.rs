use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::principal::Principal;
use crate::models::rate::RateCounter;

/// Storage seam for principals and their single-session markers.
///
/// Account CRUD owns the table; the identity core only reads login columns
/// and moves the marker.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Looks up an active principal by email. Inactive accounts are
    /// invisible to login.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>>;

    /// Looks up a principal by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>>;

    /// Reads the single-session marker.
    ///
    /// # Returns
    ///
    /// The token id of the most recent login/refresh, or `None` when the
    /// marker has never been set (or the principal does not exist).
    async fn current_token_id(&self, principal_id: i64) -> Result<Option<Uuid>>;

    /// Overwrites the single-session marker. Every token whose id differs
    /// from the stored marker is revoked from this moment on.
    async fn set_current_token_id(&self, principal_id: i64, token_id: Uuid) -> Result<()>;
}

/// Storage seam for fixed-window rate counters.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Records one event for `key` in the window starting at `window_start`
    /// and returns the row after the write.
    ///
    /// # Atomicity
    ///
    /// Implementations must make the insert-or-increment-or-reset decision
    /// atomically; two concurrent callers on the same key must observe
    /// distinct counts. The SQL backend expresses this as one statement:
    ///
    /// ```sql
    /// INSERT INTO rate_counters (bucket, window_start, count)
    /// VALUES ($1, $2, 1)
    /// ON CONFLICT (bucket) DO UPDATE
    /// SET count = CASE
    ///         WHEN rate_counters.window_start = EXCLUDED.window_start
    ///             THEN rate_counters.count + 1
    ///         ELSE 1
    ///     END,
    ///     window_start = EXCLUDED.window_start
    /// RETURNING count, window_start
    /// ```
    async fn upsert_counter(&self, key: &str, window_start: i64) -> Result<RateCounter>;

    /// Reads a counter without recording an event. `None` when the key has
    /// never been seen.
    async fn read_counter(&self, key: &str) -> Result<Option<RateCounter>>;

    /// Deletes counters whose window started before `cutoff`.
    ///
    /// Correctness never depends on this; it only bounds storage growth.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    async fn purge_stale(&self, cutoff: i64) -> Result<u64>;
}
