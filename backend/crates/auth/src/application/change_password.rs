//! Change Password Use Case
//!
//! Verifies the current password, stores a new Argon2id hash and revokes
//! every other session of the identity.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::PasswordPolicyError;

use crate::application::config::AuthConfig;
use crate::application::security_events::SecurityEventRecorder;
use crate::application::token_service::{AuthContext, TokenService};
use crate::domain::entity::{
    NewSecurityEvent, RevokeReason, SecurityEventContext, SecurityEventType, Severity,
};
use crate::domain::repository::{AuthStore, CredentialStore};
use crate::domain::value_object::CredentialHash;
use crate::domain::value_object::credential::{new_password, presented_password};
use crate::error::{AuthError, AuthResult};

pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePasswordOutput {
    /// Other sessions revoked by the change
    pub revoked_sessions: u64,
}

pub struct ChangePasswordUseCase<R>
where
    R: AuthStore,
{
    store: Arc<R>,
    tokens: TokenService<R>,
    events: SecurityEventRecorder<R>,
    config: Arc<AuthConfig>,
}

impl<R> ChangePasswordUseCase<R>
where
    R: AuthStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            tokens: TokenService::new(store.clone(), clock.clone(), config.clone()),
            events: SecurityEventRecorder::new(store.clone(), clock),
            store,
            config,
        }
    }

    pub async fn execute(
        &self,
        ctx: &AuthContext,
        input: ChangePasswordInput,
    ) -> AuthResult<ChangePasswordOutput> {
        let identity = self
            .store
            .find_identity(&ctx.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let current = presented_password(input.current_password, "currentPassword")?;
        if !identity
            .credential_hash
            .verify(&current, self.config.pepper())
        {
            self.events
                .record(
                    NewSecurityEvent::new(
                        SecurityEventType::PasswordChange,
                        Severity::Medium,
                        "Password change rejected: wrong current password",
                    )
                    .for_user(Some(identity.id))
                    .from_ip(input.ip_address)
                    .with_context(SecurityEventContext {
                        session_id: Some(ctx.session_id),
                        ..Default::default()
                    }),
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        let new = new_password(input.new_password)?;
        if new.matches(&current) {
            return Err(AuthError::WeakPassword(
                "New password must differ from the current password".to_string(),
            ));
        }

        if self.config.check_breached_passwords {
            match new.check_breach().await {
                Ok(true) => {
                    return Err(AuthError::WeakPassword(
                        PasswordPolicyError::Compromised.to_string(),
                    ));
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "Breach check skipped"),
            }
        }

        let hash = CredentialHash::hash(&new, self.config.pepper())?;
        self.store
            .update_credential_hash(&identity.id, &hash)
            .await?;

        let revoked_sessions = self
            .tokens
            .revoke_other_user_tokens(&identity.id, &ctx.session_id, RevokeReason::PasswordChanged)
            .await?;

        self.events
            .record(
                NewSecurityEvent::new(
                    SecurityEventType::PasswordChange,
                    Severity::Low,
                    "Password changed",
                )
                .for_user(Some(identity.id))
                .from_ip(input.ip_address)
                .with_context(SecurityEventContext {
                    session_id: Some(ctx.session_id),
                    revoked_sessions: Some(revoked_sessions),
                    ..Default::default()
                }),
            )
            .await;

        tracing::info!(
            user_id = %identity.id,
            revoked_sessions,
            "Password changed"
        );

        Ok(ChangePasswordOutput { revoked_sessions })
    }
}
