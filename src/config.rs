//! Process-wide authentication configuration.
//! Loaded once at startup and treated as read-only for the process lifetime;
//! the resolver shares it via `Arc` and holds no other cross-request state.

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use std::time::Duration;

/// Provisioned administrator credential for the elevated-access path.
/// The secret is held as an Argon2 PHC string, never as a plaintext literal,
/// so it can be rotated out of band without touching process logic.
#[derive(Debug, Clone)]
pub struct AdminCredential {
    pub username: String,
    secret_phc: String,
}

impl AdminCredential {
    pub fn from_phc(username: impl Into<String>, secret_phc: impl Into<String>) -> Self {
        Self { username: username.into(), secret_phc: secret_phc.into() }
    }

    /// Hash a plaintext secret at load time. Intended for dev setups where
    /// only the plaintext is provisioned; production should provision the PHC.
    pub fn from_plaintext(username: impl Into<String>, secret: &str) -> Result<Self> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let argon2 = Argon2::default();
        let phc = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow!(e.to_string()))?
            .to_string();
        Ok(Self { username: username.into(), secret_phc: phc })
    }

    pub fn verify_secret(&self, secret: &str) -> bool {
        if let Ok(parsed) = PasswordHash::new(&self.secret_phc) {
            let argon2 = Argon2::default();
            argon2.verify_password(secret.as_bytes(), &parsed).is_ok()
        } else { false }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer identity tokens.
    pub bearer_secret: String,
    /// Issuer claim stamped into and required of bearer tokens.
    pub issuer: String,
    /// Lifetime of newly minted bearer tokens.
    pub bearer_ttl: Duration,
    pub admin: AdminCredential,
    /// Maximum accepted age for elevated tokens. None disables the check and
    /// keeps elevated tokens indefinitely valid, matching the legacy consoles.
    pub elevated_max_age: Option<Duration>,
    /// Upper bound on the user-store lookup during resolution.
    pub store_timeout: Duration,
}

impl AuthConfig {
    /// Read configuration from ECHOGATE_* environment variables.
    ///
    /// `ECHOGATE_BEARER_SECRET` and `ECHOGATE_ADMIN_USER` are required, plus
    /// one of `ECHOGATE_ADMIN_SECRET_PHC` (preferred) or
    /// `ECHOGATE_ADMIN_SECRET` (plaintext, hashed at load).
    pub fn from_env() -> Result<Self> {
        let bearer_secret = std::env::var("ECHOGATE_BEARER_SECRET")
            .context("ECHOGATE_BEARER_SECRET must be set")?;
        if bearer_secret.trim().is_empty() {
            anyhow::bail!("ECHOGATE_BEARER_SECRET must not be empty");
        }
        let issuer = std::env::var("ECHOGATE_ISSUER").unwrap_or_else(|_| "echogate".to_string());
        let bearer_ttl_secs: u64 = std::env::var("ECHOGATE_BEARER_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let admin_user = std::env::var("ECHOGATE_ADMIN_USER")
            .context("ECHOGATE_ADMIN_USER must be set")?;
        let admin = match std::env::var("ECHOGATE_ADMIN_SECRET_PHC") {
            Ok(phc) => AdminCredential::from_phc(admin_user, phc),
            Err(_) => {
                let secret = std::env::var("ECHOGATE_ADMIN_SECRET").context(
                    "one of ECHOGATE_ADMIN_SECRET_PHC or ECHOGATE_ADMIN_SECRET must be set",
                )?;
                tracing::warn!("hashing plaintext ECHOGATE_ADMIN_SECRET at startup; provision ECHOGATE_ADMIN_SECRET_PHC instead");
                AdminCredential::from_plaintext(admin_user, &secret)?
            }
        };

        let elevated_max_age = std::env::var("ECHOGATE_ELEVATED_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let store_timeout_ms: u64 = std::env::var("ECHOGATE_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);

        Ok(Self {
            bearer_secret,
            issuer,
            bearer_ttl: Duration::from_secs(bearer_ttl_secs),
            admin,
            elevated_max_age,
            store_timeout: Duration::from_millis(store_timeout_ms),
        })
    }
}
