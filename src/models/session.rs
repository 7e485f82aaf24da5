use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The session cookie name.
pub const SESSION_COOKIE: &str = "sd_session";

/// The verification-pass cookie name. Distinct from the session cookie so
/// the two token classes can never be confused by name.
pub const VERIFICATION_COOKIE: &str = "sd_verified";

/// The signed payload carried inside a session token.
///
/// The wire form is camelCase JSON, base64url-encoded and HMAC-signed by the
/// token codec. Decoding is strongly typed: a payload missing any of these
/// fields, or carrying the wrong type, is an invalid token, never a partial
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// The authenticated principal, or 0 for verification passes.
    pub subject_id: i64,
    /// Unix seconds at which the token was minted.
    pub issued_at: i64,
    /// Unix seconds past which the token is dead regardless of signature.
    pub expires_at: i64,
    /// Identifies this specific issuance; compared against the principal's
    /// single-session marker.
    pub token_id: Uuid,
}

/// The authenticated identity injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// The authenticated principal's id.
    pub principal_id: i64,
    /// The token id the request authenticated with.
    pub token_id: Uuid,
}
