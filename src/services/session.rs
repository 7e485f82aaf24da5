use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::crypto::secrets::SecretProvider;
use crate::crypto::token;
use crate::error::Result;
use crate::models::session::SessionClaims;
use crate::repositories::store::PrincipalStore;

/// A freshly minted token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed cookie value.
    pub token: String,
    /// The claims inside it.
    pub claims: SessionClaims,
}

/// The outcome of authenticating a presented token.
///
/// `Invalid` and `Revoked` must look identical to the client; they are kept
/// apart here so callers can log and clear cookies appropriately.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Signature, expiry, and the single-session marker all check out.
    Active(SessionClaims),
    /// Malformed, forged, or expired.
    Invalid,
    /// Structurally valid but superseded by a newer session.
    Revoked,
}

/// Issues, verifies, and rotates session tokens.
///
/// Tokens are stateless; the only persisted piece is the single-session
/// marker on the principal row, which makes at most one issuance live per
/// account without any token blacklist.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn PrincipalStore>,
    secrets: SecretProvider,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    /// Creates a new `SessionService`.
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        secrets: SecretProvider,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, secrets, clock }
    }

    /// Mints a signed token for `subject_id` with the given lifetime.
    ///
    /// Pure apart from randomness: the caller decides whether the new token
    /// id also becomes the principal's marker (see `establish`).
    pub fn issue(&self, subject_id: i64, ttl_seconds: i64) -> Result<IssuedToken> {
        let key = self.secrets.key()?;
        let now = self.clock.now_unix();
        let claims = SessionClaims {
            subject_id,
            issued_at: now,
            expires_at: now + ttl_seconds,
            token_id: Uuid::new_v4(),
        };
        let token = token::encode(&key, &claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Checks signature and expiry only; never consults the marker.
    ///
    /// # Returns
    ///
    /// The decoded claims, or `None` for anything malformed, forged, or
    /// expired. Errors are reserved for infrastructure failures (missing
    /// signing secret).
    pub fn verify(&self, presented: &str) -> Result<Option<SessionClaims>> {
        let key = self.secrets.key()?;
        let Some(claims) = token::decode(&key, presented) else {
            return Ok(None);
        };
        if claims.expires_at <= claims.issued_at {
            return Ok(None);
        }
        if claims.expires_at <= self.clock.now_unix() {
            return Ok(None);
        }
        Ok(Some(claims))
    }

    /// Full authentication: `verify`, then the single-session marker.
    ///
    /// An absent marker passes; accounts that predate single-session
    /// enforcement keep working until their next login moves the marker.
    pub async fn authenticate(&self, presented: &str) -> Result<Verdict> {
        let Some(claims) = self.verify(presented)? else {
            return Ok(Verdict::Invalid);
        };

        // Verification passes carry subject 0 and must never authenticate,
        // marker or no marker.
        if claims.subject_id <= 0 {
            return Ok(Verdict::Invalid);
        }

        match self.store.current_token_id(claims.subject_id).await? {
            Some(current) if current != claims.token_id => Ok(Verdict::Revoked),
            _ => Ok(Verdict::Active(claims)),
        }
    }

    /// Rotates a live session: authenticate the old token, mint a new one
    /// for the same subject, and move the marker to it.
    ///
    /// Moving the marker is what revokes the old token's family; presenting
    /// the pre-refresh token afterwards yields `Revoked`.
    ///
    /// # Returns
    ///
    /// The replacement token, or `None` when the old token did not
    /// authenticate (invalid and revoked are both dead ends here).
    pub async fn refresh(&self, presented: &str, ttl_seconds: i64) -> Result<Option<IssuedToken>> {
        let claims = match self.authenticate(presented).await? {
            Verdict::Active(claims) => claims,
            Verdict::Invalid | Verdict::Revoked => return Ok(None),
        };

        let issued = self.issue(claims.subject_id, ttl_seconds)?;
        self.store
            .set_current_token_id(claims.subject_id, issued.claims.token_id)
            .await?;
        Ok(Some(issued))
    }

    /// Login-side issuance: mint a token and make it the one live session.
    pub async fn establish(&self, subject_id: i64, ttl_seconds: i64) -> Result<IssuedToken> {
        let issued = self.issue(subject_id, ttl_seconds)?;
        self.store
            .set_current_token_id(subject_id, issued.claims.token_id)
            .await?;
        Ok(issued)
    }

    /// Logs the principal out everywhere by pointing the marker at a fresh
    /// id no outstanding cookie holds.
    pub async fn revoke_all(&self, subject_id: i64) -> Result<()> {
        self.store
            .set_current_token_id(subject_id, Uuid::new_v4())
            .await
    }
}
