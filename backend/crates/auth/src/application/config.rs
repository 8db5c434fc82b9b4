//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::env;
use std::time::Duration;

use platform::crypto::{from_base64, random_bytes};
use thiserror::Error;

use crate::domain::entity::LockoutPolicy;
use crate::domain::value_object::IdentityKind;

/// HMAC-SHA256 keys shorter than the digest weaken the MAC.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing key (at least 32 bytes)
    pub jwt_secret: Vec<u8>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Access token lifetime for member identities (1 hour)
    pub member_access_ttl: Duration,
    /// Access token lifetime for admin identities (8 hours)
    pub admin_access_ttl: Duration,
    /// Refresh token lifetime, also the absolute session lifetime (30 days)
    pub refresh_ttl: Duration,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    pub lockout: LockoutPolicy,
    /// Active sessions at which MULTIPLE_SESSIONS is raised
    pub multiple_sessions_threshold: usize,
    /// Issuer label shown in authenticator apps
    pub totp_issuer: String,
    /// Query HIBP when a password is changed
    pub check_breached_passwords: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: vec![0u8; MIN_JWT_SECRET_LENGTH],
            jwt_issuer: "ecommerce-auth".to_string(),
            jwt_audience: "ecommerce-api".to_string(),
            member_access_ttl: Duration::from_secs(3600),
            admin_access_ttl: Duration::from_secs(8 * 3600),
            refresh_ttl: Duration::from_secs(30 * 24 * 3600),
            password_pepper: None,
            lockout: LockoutPolicy::default(),
            multiple_sessions_threshold: 3,
            totp_issuer: "Shop".to_string(),
            check_breached_passwords: false,
        }
    }
}

impl AuthConfig {
    /// Create config with a random signing key (for development)
    pub fn with_random_secret() -> Self {
        Self {
            jwt_secret: random_bytes(MIN_JWT_SECRET_LENGTH),
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self::with_random_secret()
    }

    /// Read configuration from `AUTH_*` environment variables.
    ///
    /// `AUTH_JWT_SECRET` (base64, 32+ bytes) is required; everything else
    /// falls back to [`AuthConfig::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_b64 =
            env::var("AUTH_JWT_SECRET").map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?;
        let jwt_secret = from_base64(secret_b64.trim()).map_err(|e| ConfigError::Invalid {
            var: "AUTH_JWT_SECRET",
            reason: e.to_string(),
        })?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                var: "AUTH_JWT_SECRET",
                reason: format!(
                    "decodes to {} bytes, need at least {}",
                    jwt_secret.len(),
                    MIN_JWT_SECRET_LENGTH
                ),
            });
        }

        let defaults = Self::default();
        Ok(Self {
            jwt_secret,
            jwt_issuer: env::var("AUTH_JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: env::var("AUTH_JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            member_access_ttl: secs_var("AUTH_ACCESS_TTL_SECS", defaults.member_access_ttl)?,
            admin_access_ttl: secs_var("AUTH_ADMIN_ACCESS_TTL_SECS", defaults.admin_access_ttl)?,
            refresh_ttl: secs_var("AUTH_REFRESH_TTL_SECS", defaults.refresh_ttl)?,
            password_pepper: env::var("AUTH_PASSWORD_PEPPER")
                .ok()
                .filter(|p| !p.is_empty())
                .map(String::into_bytes),
            ..defaults
        })
    }

    pub fn access_ttl_for(&self, kind: IdentityKind) -> chrono::Duration {
        let ttl = match kind {
            IdentityKind::Member => self.member_access_ttl,
            IdentityKind::Admin => self.admin_access_ttl,
        };
        to_chrono(ttl)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        to_chrono(self.refresh_ttl)
    }

    pub fn failure_window(&self) -> chrono::Duration {
        to_chrono(self.lockout.failure_window)
    }

    pub fn lock_duration(&self) -> chrono::Duration {
        to_chrono(self.lockout.lock_duration)
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(d.as_secs()).unwrap_or(i64::MAX / 1000))
}

fn secs_var(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var,
                reason: format!("expected seconds, got {raw:?}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be positive".to_string(),
                });
            }
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
