use std::env;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The deployment environment. Anything other than "development" is
    /// treated as production.
    pub app_env: String,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The duration of a verification pass in minutes.
    pub verification_pass_minutes: i64,
    /// The HMAC key used to sign session tokens. Optional only so that
    /// development mode can run with an ephemeral key; production requests
    /// fail when it is absent.
    pub signing_secret: Option<Zeroizing<Vec<u8>>>,
    /// The origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Host suffixes of shared edge platforms. Hosts under these are never
    /// trusted as "our own" by the origin guard, since any tenant can mint
    /// sibling names beneath them.
    pub shared_host_suffixes: Vec<String>,
    /// Whether login requires a prior verification pass.
    pub login_requires_verification: bool,
    /// The shared secret for the human-verification challenge, if any.
    pub challenge_secret: Option<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let signing_secret = match env::var("SESSION_SIGNING_SECRET") {
            Ok(mut secret_hex) => {
                let secret_bytes = hex::decode(&secret_hex)
                    .context("SESSION_SIGNING_SECRET must be valid hexadecimal")?;

                secret_hex.zeroize();

                if secret_bytes.len() != 32 {
                    anyhow::bail!(
                        "SESSION_SIGNING_SECRET must be exactly 32 bytes \
                         (64 hex characters, generate with: openssl rand -hex 32)"
                    );
                }

                Some(Zeroizing::new(secret_bytes))
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            // Absent APP_ENV means production; development is opt-in.
            app_env: env::var("APP_ENV")
                .unwrap_or_else(|_| "production".to_string()),
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            verification_pass_minutes: env::var("VERIFICATION_PASS_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid VERIFICATION_PASS_MINUTES")?,
            signing_secret,
            allowed_origins: parse_list(
                &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| {
                    "http://localhost:3000,http://127.0.0.1:3000,http://[::1]:3000".to_string()
                }),
            ),
            shared_host_suffixes: parse_list(
                &env::var("SHARED_HOST_SUFFIXES").unwrap_or_default(),
            ),
            login_requires_verification: env::var("LOGIN_REQUIRES_VERIFICATION")
                .map(|v| flag_enabled(&v))
                .unwrap_or(false),
            challenge_secret: env::var("CHALLENGE_SECRET").ok(),
        })
    }

    /// Returns `true` when running in development mode.
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }

    /// Returns `true` when cookies must carry the `Secure` attribute.
    pub fn is_production(&self) -> bool {
        !self.is_development()
    }

    /// The session lifetime in seconds.
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_duration_days * 86_400
    }

    /// The verification-pass lifetime in seconds.
    pub fn pass_ttl_seconds(&self) -> i64 {
        self.verification_pass_minutes * 60
    }
}

/// Splits a comma-separated environment value into trimmed, non-empty items.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn flag_enabled(raw: &str) -> bool {
    let v = raw.trim();
    v == "1" || v.eq_ignore_ascii_case("true")
}
