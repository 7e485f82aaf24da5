use std::sync::{Arc, OnceLock};

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Process-lifetime development key. Minted once, on first use, and only
/// when development mode is explicitly enabled.
static DEV_SECRET: OnceLock<[u8; 32]> = OnceLock::new();

/// Supplies the HMAC signing key to the token services.
///
/// Without a configured secret, production requests fail with
/// `NotConfigured` instead of falling back to a guessable key. Development
/// mode instead mints one ephemeral key per process, so local setups work
/// out of the box while every restart invalidates outstanding tokens.
#[derive(Clone)]
pub struct SecretProvider {
    configured: Option<Arc<Zeroizing<Vec<u8>>>>,
    dev_mode: bool,
}

impl SecretProvider {
    /// Builds the provider from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            configured: config
                .signing_secret
                .as_ref()
                .map(|secret| Arc::new(secret.clone())),
            dev_mode: config.is_development(),
        }
    }

    /// A provider with a fixed key, for tests and local tooling.
    pub fn fixed(key: Vec<u8>) -> Self {
        Self {
            configured: Some(Arc::new(Zeroizing::new(key))),
            dev_mode: false,
        }
    }

    /// Returns the signing key.
    ///
    /// # Returns
    ///
    /// A zeroizing copy of the key, or `NotConfigured` when no key is
    /// available for this deployment.
    pub fn key(&self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(secret) = &self.configured {
            return Ok(Zeroizing::new(secret.to_vec()));
        }

        if self.dev_mode {
            let key = DEV_SECRET.get_or_init(|| {
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                tracing::warn!(
                    "🔐 No SESSION_SIGNING_SECRET set; minted an ephemeral development key \
                     (all sessions die on restart)"
                );
                bytes
            });
            return Ok(Zeroizing::new(key.to_vec()));
        }

        Err(AppError::NotConfigured)
    }
}
