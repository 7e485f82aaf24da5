use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::error::Result;
use crate::services::session::SessionService;

/// Sentinel subject carried by every verification pass. Never a principal
/// id; `SessionService::authenticate` refuses it outright.
const PASS_SUBJECT: i64 = 0;

/// Upstream human-verification challenge validation (CAPTCHA or similar).
/// External service; only the decision crosses this boundary.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Validates a challenge response submitted by `remote_ip`.
    async fn verify(&self, challenge_response: &str, remote_ip: &str) -> Result<bool>;
}

/// Accepts responses equal to a configured shared secret. Serves
/// self-hosted and development deployments that have no CAPTCHA vendor.
pub struct SharedSecretVerifier {
    secret: String,
}

impl SharedSecretVerifier {
    /// Creates a verifier around the shared secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl ChallengeVerifier for SharedSecretVerifier {
    async fn verify(&self, challenge_response: &str, _remote_ip: &str) -> Result<bool> {
        let expected = self.secret.as_bytes();
        let provided = challenge_response.as_bytes();
        Ok(expected.len() == provided.len() && bool::from(expected.ct_eq(provided)))
    }
}

/// Rejects everything. Installed when no challenge secret is configured so
/// the verification endpoint fails closed instead of waving callers through.
pub struct UnconfiguredVerifier;

#[async_trait]
impl ChallengeVerifier for UnconfiguredVerifier {
    async fn verify(&self, _challenge_response: &str, remote_ip: &str) -> Result<bool> {
        tracing::warn!(
            "Challenge from {} rejected: no CHALLENGE_SECRET configured",
            remote_ip
        );
        Ok(false)
    }
}

/// Issues and checks short-lived verification passes.
///
/// A pass reuses the session token format under its own cookie name. It
/// proves "a human completed a challenge recently" and nothing else: no
/// identity is ever read out of one, and the single-session marker does not
/// apply.
#[derive(Clone)]
pub struct VerificationService {
    sessions: SessionService,
    verifier: Arc<dyn ChallengeVerifier>,
}

impl VerificationService {
    /// Creates a new `VerificationService`.
    pub fn new(sessions: SessionService, verifier: Arc<dyn ChallengeVerifier>) -> Self {
        Self { sessions, verifier }
    }

    /// Hands the challenge response to the configured verifier.
    pub async fn check_challenge(&self, response: &str, remote_ip: &str) -> Result<bool> {
        self.verifier.verify(response, remote_ip).await
    }

    /// Mints a pass valid for `ttl_seconds`.
    pub fn issue_pass(&self, ttl_seconds: i64) -> Result<String> {
        Ok(self.sessions.issue(PASS_SUBJECT, ttl_seconds)?.token)
    }

    /// Whether `presented` is a currently valid pass. Signature and expiry
    /// only; a pass never touches the single-session marker.
    pub fn has_valid_pass(&self, presented: &str) -> Result<bool> {
        Ok(self.sessions.verify(presented)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::secrets::SecretProvider;
    use crate::repositories::memory::MemoryStore;
    use crate::services::session::Verdict;

    fn service(clock: Arc<ManualClock>) -> VerificationService {
        let sessions = SessionService::new(
            Arc::new(MemoryStore::new()),
            SecretProvider::fixed(vec![5u8; 32]),
            clock,
        );
        VerificationService::new(sessions, Arc::new(SharedSecretVerifier::new("letmein")))
    }

    #[tokio::test]
    async fn shared_secret_accepts_only_the_exact_secret() {
        let clock = Arc::new(ManualClock::new(1_000));
        let verification = service(clock);

        assert!(verification.check_challenge("letmein", "1.2.3.4").await.unwrap());
        assert!(!verification.check_challenge("LETMEIN", "1.2.3.4").await.unwrap());
        assert!(!verification.check_challenge("letmein2", "1.2.3.4").await.unwrap());
        assert!(!verification.check_challenge("", "1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn unconfigured_verifier_rejects_everything() {
        let verifier = UnconfiguredVerifier;
        assert!(!verifier.verify("anything", "1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn pass_is_valid_until_its_ttl_elapses() {
        let clock = Arc::new(ManualClock::new(1_000));
        let verification = service(clock.clone());

        let pass = verification.issue_pass(600).unwrap();
        assert!(verification.has_valid_pass(&pass).unwrap());

        clock.advance(599);
        assert!(verification.has_valid_pass(&pass).unwrap());

        clock.advance(1);
        assert!(!verification.has_valid_pass(&pass).unwrap());
    }

    #[tokio::test]
    async fn garbage_is_not_a_pass() {
        let clock = Arc::new(ManualClock::new(1_000));
        let verification = service(clock);
        assert!(!verification.has_valid_pass("not.a.token").unwrap());
        assert!(!verification.has_valid_pass("").unwrap());
    }

    #[tokio::test]
    async fn a_pass_never_authenticates_as_a_session() {
        let clock = Arc::new(ManualClock::new(1_000));
        let sessions = SessionService::new(
            Arc::new(MemoryStore::new()),
            SecretProvider::fixed(vec![5u8; 32]),
            clock,
        );
        let verification = VerificationService::new(
            sessions.clone(),
            Arc::new(SharedSecretVerifier::new("letmein")),
        );

        let pass = verification.issue_pass(600).unwrap();
        assert!(matches!(
            sessions.authenticate(&pass).await.unwrap(),
            Verdict::Invalid
        ));
    }
}
