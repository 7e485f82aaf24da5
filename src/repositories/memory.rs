use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::principal::Principal;
use crate::models::rate::RateCounter;
use crate::repositories::store::{PrincipalStore, RateStore};

/// In-memory `PrincipalStore` + `RateStore`.
///
/// Backs the test suites and local tooling. The counter upsert runs its
/// compare-and-branch inside one mutex critical section, which gives the
/// same atomicity the SQL statement gives the Postgres adapter.
#[derive(Default)]
pub struct MemoryStore {
    principals: Mutex<HashMap<i64, Principal>>,
    counters: Mutex<HashMap<String, RateCounter>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a principal, replacing any previous row with the same id.
    pub async fn insert_principal(&self, principal: Principal) {
        self.principals.lock().await.insert(principal.id, principal);
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let principals = self.principals.lock().await;
        Ok(principals
            .values()
            .find(|p| p.email == email && p.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>> {
        Ok(self.principals.lock().await.get(&id).cloned())
    }

    async fn current_token_id(&self, principal_id: i64) -> Result<Option<Uuid>> {
        let principals = self.principals.lock().await;
        Ok(principals
            .get(&principal_id)
            .and_then(|p| p.current_session_id))
    }

    async fn set_current_token_id(&self, principal_id: i64, token_id: Uuid) -> Result<()> {
        if let Some(principal) = self.principals.lock().await.get_mut(&principal_id) {
            principal.current_session_id = Some(token_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn upsert_counter(&self, key: &str, window_start: i64) -> Result<RateCounter> {
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(key.to_string())
            .and_modify(|c| {
                if c.window_start == window_start {
                    c.count += 1;
                } else {
                    // Window rolled over: this event is the first of the new
                    // window, not an increment of the old one.
                    *c = RateCounter { count: 1, window_start };
                }
            })
            .or_insert(RateCounter { count: 1, window_start });
        Ok(counter.clone())
    }

    async fn read_counter(&self, key: &str) -> Result<Option<RateCounter>> {
        Ok(self.counters.lock().await.get(key).cloned())
    }

    async fn purge_stale(&self, cutoff: i64) -> Result<u64> {
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, c| c.window_start >= cutoff);
        Ok((before - counters.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn principal(id: i64, email: &str, active: bool) -> Principal {
        Principal {
            id,
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_admin: false,
            is_active: active,
            current_session_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_increments_within_a_window_and_resets_across() {
        let store = MemoryStore::new();

        let first = store.upsert_counter("k", 60).await.unwrap();
        assert_eq!(first, RateCounter { count: 1, window_start: 60 });

        let second = store.upsert_counter("k", 60).await.unwrap();
        assert_eq!(second.count, 2);

        // A later window starts over at 1 rather than inheriting the count.
        let rolled = store.upsert_counter("k", 120).await.unwrap();
        assert_eq!(rolled, RateCounter { count: 1, window_start: 120 });
    }

    #[tokio::test]
    async fn read_counter_never_records_an_event() {
        let store = MemoryStore::new();
        assert!(store.read_counter("quiet").await.unwrap().is_none());

        store.upsert_counter("quiet", 0).await.unwrap();
        store.read_counter("quiet").await.unwrap();
        let after = store.read_counter("quiet").await.unwrap().unwrap();
        assert_eq!(after.count, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_windows_before_the_cutoff() {
        let store = MemoryStore::new();
        store.upsert_counter("old", 100).await.unwrap();
        store.upsert_counter("new", 200).await.unwrap();

        let purged = store.purge_stale(150).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.read_counter("old").await.unwrap().is_none());
        assert!(store.read_counter("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn email_lookup_skips_inactive_principals() {
        let store = MemoryStore::new();
        store.insert_principal(principal(1, "live@example.com", true)).await;
        store.insert_principal(principal(2, "gone@example.com", false)).await;

        assert!(store.find_by_email("live@example.com").await.unwrap().is_some());
        assert!(store.find_by_email("gone@example.com").await.unwrap().is_none());
        // find_by_id still sees the inactive row; callers decide.
        assert!(store.find_by_id(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn marker_round_trip() {
        let store = MemoryStore::new();
        store.insert_principal(principal(7, "a@example.com", true)).await;

        assert_eq!(store.current_token_id(7).await.unwrap(), None);

        let token_id = Uuid::new_v4();
        store.set_current_token_id(7, token_id).await.unwrap();
        assert_eq!(store.current_token_id(7).await.unwrap(), Some(token_id));

        // Unknown principals read as "no marker".
        assert_eq!(store.current_token_id(999).await.unwrap(), None);
    }
}
