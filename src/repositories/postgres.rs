//! PostgreSQL adapters for the identity stores.
//!
//! Table management lives with the account-CRUD side of the product; this
//! module only assumes the shape below and keeps every statement
//! parameterized.
//!
//! ```sql
//! CREATE TABLE principals (
//!     id                  BIGSERIAL PRIMARY KEY,
//!     email               TEXT NOT NULL UNIQUE,
//!     password_hash       TEXT NOT NULL,
//!     is_admin            BOOLEAN NOT NULL DEFAULT false,
//!     is_active           BOOLEAN NOT NULL DEFAULT true,
//!     current_session_id  UUID,
//!     created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//!
//! CREATE TABLE rate_counters (
//!     bucket        TEXT PRIMARY KEY,
//!     window_start  BIGINT NOT NULL,
//!     count         BIGINT NOT NULL
//! );
//! ```

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::principal::Principal;
use crate::models::rate::RateCounter;
use crate::repositories::store::{PrincipalStore, RateStore};

const PRINCIPAL_COLUMNS: &str =
    "id, email, password_hash, is_admin, is_active, current_session_id, created_at";

/// `PrincipalStore` and `RateStore` over the deadpool connection pool.
///
/// Statements go through the pool's prepared-statement cache, so each SQL
/// string is parsed once per connection.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Creates a new `PgStore` over the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// A helper function to map a `tokio_postgres::Row` to a `Principal`.
fn row_to_principal(row: &Row) -> Result<Principal> {
    Ok(Principal {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|_| AppError::MissingData("password_hash".to_string()))?,
        is_admin: row
            .try_get("is_admin")
            .map_err(|_| AppError::MissingData("is_admin".to_string()))?,
        is_active: row
            .try_get("is_active")
            .map_err(|_| AppError::MissingData("is_active".to_string()))?,
        current_session_id: row
            .try_get("current_session_id")
            .map_err(|_| AppError::MissingData("current_session_id".to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

fn row_to_counter(row: &Row) -> Result<RateCounter> {
    Ok(RateCounter {
        count: row.try_get("count").map_err(|_| AppError::MissingData("count".to_string()))?,
        window_start: row
            .try_get("window_start")
            .map_err(|_| AppError::MissingData("window_start".to_string()))?,
    })
}

#[async_trait]
impl PrincipalStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE email = $1 AND is_active = true"
            ))
            .await?;
        let row = client.query_opt(&stmt, &[&email]).await?;
        row.map(|r| row_to_principal(&r)).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1"
            ))
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        row.map(|r| row_to_principal(&r)).transpose()
    }

    async fn current_token_id(&self, principal_id: i64) -> Result<Option<Uuid>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("SELECT current_session_id FROM principals WHERE id = $1")
            .await?;
        let row = client.query_opt(&stmt, &[&principal_id]).await?;
        match row {
            Some(row) => row
                .try_get("current_session_id")
                .map_err(|_| AppError::MissingData("current_session_id".to_string())),
            None => Ok(None),
        }
    }

    async fn set_current_token_id(&self, principal_id: i64, token_id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("UPDATE principals SET current_session_id = $2 WHERE id = $1")
            .await?;
        client.execute(&stmt, &[&principal_id, &token_id]).await?;
        Ok(())
    }
}

#[async_trait]
impl RateStore for PgStore {
    async fn upsert_counter(&self, key: &str, window_start: i64) -> Result<RateCounter> {
        let client = self.pool.get().await?;
        // One statement, so concurrent callers on the same bucket can never
        // both observe the pre-increment count.
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO rate_counters (bucket, window_start, count)
                VALUES ($1, $2, 1)
                ON CONFLICT (bucket) DO UPDATE
                SET count = CASE
                        WHEN rate_counters.window_start = EXCLUDED.window_start
                            THEN rate_counters.count + 1
                        ELSE 1
                    END,
                    window_start = EXCLUDED.window_start
                RETURNING count, window_start
                "#,
            )
            .await?;
        let row = client.query_one(&stmt, &[&key, &window_start]).await?;
        row_to_counter(&row)
    }

    async fn read_counter(&self, key: &str) -> Result<Option<RateCounter>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("SELECT count, window_start FROM rate_counters WHERE bucket = $1")
            .await?;
        let row = client.query_opt(&stmt, &[&key]).await?;
        row.map(|r| row_to_counter(&r)).transpose()
    }

    async fn purge_stale(&self, cutoff: i64) -> Result<u64> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM rate_counters WHERE window_start < $1")
            .await?;
        let purged = client.execute(&stmt, &[&cutoff]).await?;
        Ok(purged)
    }
}
