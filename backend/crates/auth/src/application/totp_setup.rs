//! TOTP Setup Use Case
//!
//! Enrol, confirm and disable TOTP two-factor authentication.
//! A fresh secret is stored disabled until a code generated from it is
//! confirmed.

use std::sync::Arc;

use kernel::id::UserId;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::security_events::SecurityEventRecorder;
use crate::domain::entity::{Identity, NewSecurityEvent, SecurityEventType, Severity};
use crate::domain::repository::{CredentialStore, EventStore};
use crate::domain::value_object::TotpSecret;
use crate::error::{AuthError, AuthResult};

/// TOTP setup output
#[derive(Debug, Clone)]
pub struct TotpSetupOutput {
    /// QR code as base64-encoded PNG
    pub qr_code_base64: String,
    /// Secret for manual entry
    pub secret: String,
    /// otpauth:// URL
    pub otpauth_url: String,
}

/// TOTP setup use case
pub struct TotpSetupUseCase<R>
where
    R: CredentialStore + EventStore,
{
    store: Arc<R>,
    events: SecurityEventRecorder<R>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<R> TotpSetupUseCase<R>
where
    R: CredentialStore + EventStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            events: SecurityEventRecorder::new(store.clone(), clock.clone()),
            store,
            clock,
            config,
        }
    }

    /// Start TOTP setup - generates new secret
    pub async fn setup(&self, user_id: &UserId) -> AuthResult<TotpSetupOutput> {
        let identity = self.identity(user_id).await?;
        if identity.two_factor_enabled {
            return Err(AuthError::validation(
                "twoFactor",
                "two-factor authentication is already enabled",
            ));
        }

        let secret = TotpSecret::generate();
        self.store
            .update_two_factor(user_id, false, Some(&secret))
            .await?;

        let issuer = &self.config.totp_issuer;
        let qr_code_base64 = secret.qr_code_base64(issuer, &identity.email)?;
        let otpauth_url = secret.otpauth_url(issuer, &identity.email)?;

        tracing::info!(user_id = %user_id, "TOTP setup initiated");

        Ok(TotpSetupOutput {
            qr_code_base64,
            secret: secret.as_base32().to_string(),
            otpauth_url,
        })
    }

    /// Verify TOTP code and enable 2FA
    pub async fn verify(&self, user_id: &UserId, code: &str) -> AuthResult<()> {
        let identity = self.identity(user_id).await?;
        let secret = identity
            .two_factor_secret
            .as_ref()
            .ok_or_else(|| AuthError::validation("twoFactor", "setup has not been started"))?;

        if !self.check_code(&identity, secret, code)? {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.store
            .update_two_factor(user_id, true, Some(secret))
            .await?;

        tracing::info!(user_id = %user_id, "TOTP enabled");
        Ok(())
    }

    /// Disable TOTP. Requires a current code.
    pub async fn disable(&self, user_id: &UserId, code: &str, ip_address: Option<String>) -> AuthResult<()> {
        let identity = self.identity(user_id).await?;
        let secret = match (&identity.two_factor_secret, identity.two_factor_enabled) {
            (Some(secret), true) => secret,
            _ => {
                return Err(AuthError::validation(
                    "twoFactor",
                    "two-factor authentication is not enabled",
                ));
            }
        };

        if !self.check_code(&identity, secret, code)? {
            self.events
                .record(
                    NewSecurityEvent::new(
                        SecurityEventType::InvalidTwoFactor,
                        Severity::Medium,
                        "Invalid two-factor code when disabling two-factor",
                    )
                    .for_user(Some(identity.id))
                    .from_ip(ip_address),
                )
                .await;
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.store.update_two_factor(user_id, false, None).await?;

        tracing::info!(user_id = %user_id, "TOTP disabled");
        Ok(())
    }

    async fn identity(&self, user_id: &UserId) -> AuthResult<Identity> {
        self.store
            .find_identity(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    fn check_code(&self, identity: &Identity, secret: &TotpSecret, code: &str) -> AuthResult<bool> {
        let unix_time = u64::try_from(self.clock.now().timestamp()).unwrap_or_default();
        secret.verify_at(code, &self.config.totp_issuer, &identity.email, unix_time)
    }
}
