use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an account as seen by the identity core.
///
/// Account CRUD lives elsewhere; only the columns the session and login
/// paths read are modeled here.
#[derive(Clone, Debug)]
pub struct Principal {
    /// The unique identifier for the principal.
    pub id: i64,
    /// The principal's email address.
    pub email: String,
    /// The principal's Argon2id password hash in PHC string format.
    pub password_hash: String,
    /// Whether the principal may use the admin console.
    pub is_admin: bool,
    /// Whether the principal is active. Inactive principals cannot log in.
    pub is_active: bool,
    /// The single-session marker: the token id of the most recent login or
    /// refresh. `None` means single-session enforcement has never engaged
    /// for this account.
    pub current_session_id: Option<Uuid>,
    /// The timestamp when the principal was created.
    pub created_at: DateTime<Utc>,
}
