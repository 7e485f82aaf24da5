use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crypto::secrets::SecretProvider;
use crate::error::Result;
use crate::repositories::postgres::PgStore;
use crate::repositories::store::{PrincipalStore, RateStore};
use crate::services::rate_limit::RateLimiter;
use crate::services::session::SessionService;
use crate::services::verification::{
    ChallengeVerifier, SharedSecretVerifier, UnconfiguredVerifier, VerificationService,
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Principal lookups and the single-session marker.
    pub principals: Arc<dyn PrincipalStore>,
    /// Fixed-window rate counters.
    pub rates: Arc<dyn RateStore>,
    /// Token issue, verify, and rotation.
    pub sessions: SessionService,
    /// Challenge checks and verification passes.
    pub verification: VerificationService,
    /// Fixed-window decisions over `rates`.
    pub limiter: RateLimiter,
}

impl AppState {
    /// Creates the production state: Postgres-backed stores, the system
    /// clock, and whichever challenge verifier is configured.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: Config) -> Result<Self> {
        let pool = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized with deadpool-postgres");

        let store = Arc::new(PgStore::new(pool));

        let verifier: Arc<dyn ChallengeVerifier> = match config.challenge_secret.as_deref() {
            Some(secret) => {
                tracing::info!("✅ Challenge verifier configured");
                Arc::new(SharedSecretVerifier::new(secret))
            }
            None => Arc::new(UnconfiguredVerifier),
        };

        Ok(Self::assemble(
            config,
            store.clone(),
            store,
            Arc::new(SystemClock),
            verifier,
        ))
    }

    /// Builds the state from explicit parts.
    pub fn assemble(
        config: Config,
        principals: Arc<dyn PrincipalStore>,
        rates: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn ChallengeVerifier>,
    ) -> Self {
        let secrets = SecretProvider::from_config(&config);
        let sessions = SessionService::new(principals.clone(), secrets, clock.clone());
        let verification = VerificationService::new(sessions.clone(), verifier);
        let limiter = RateLimiter::new(rates.clone(), clock);

        AppState {
            config: Arc::new(config),
            principals,
            rates,
            sessions,
            verification,
            limiter,
        }
    }
}
