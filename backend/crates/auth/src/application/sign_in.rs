//! Sign In Use Case
//!
//! Authenticates an identity, opens a session and issues a token pair.

use std::collections::BTreeSet;
use std::sync::Arc;

use kernel::id::SessionId;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::lockout_guard::{FailedAttempt, LockoutGuard};
use crate::application::permission_resolver::PermissionResolver;
use crate::application::security_events::SecurityEventRecorder;
use crate::application::session_registry::SessionRegistry;
use crate::application::token_service::{AccessClaims, TokenPair, TokenService};
use crate::domain::entity::{
    DeviceInfo, Identity, IdentityProfile, NewSecurityEvent, NewSession, SecurityEventContext,
    SecurityEventType, SessionHandle, Severity,
};
use crate::domain::repository::{AuthStore, CredentialStore};
use crate::domain::value_object::credential::presented_password;
use crate::domain::value_object::{IdentityStatus, LoginIdentifier, Permission, RoleId, TokenHash};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    /// Email (case-insensitive)
    pub identifier: String,
    pub password: String,
    /// TOTP code, required once two-factor is enabled
    pub two_factor_code: Option<String>,
    /// Client-supplied device details plus request IP / User-Agent
    pub device: DeviceInfo,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub tokens: TokenPair,
    pub session: SessionHandle,
    pub profile: IdentityProfile,
    pub roles: BTreeSet<RoleId>,
    pub permissions: BTreeSet<Permission>,
}

/// Sign in use case
pub struct SignInUseCase<R>
where
    R: AuthStore,
{
    store: Arc<R>,
    tokens: TokenService<R>,
    sessions: SessionRegistry<R>,
    lockout: LockoutGuard<R>,
    events: SecurityEventRecorder<R>,
    resolver: PermissionResolver<R>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<R> SignInUseCase<R>
where
    R: AuthStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            tokens: TokenService::new(store.clone(), clock.clone(), config.clone()),
            sessions: SessionRegistry::new(store.clone(), clock.clone()),
            lockout: LockoutGuard::new(store.clone(), clock.clone(), config.clone()),
            events: SecurityEventRecorder::new(store.clone(), clock.clone()),
            resolver: PermissionResolver::new(store.clone()),
            store,
            clock,
            config,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        let identifier = LoginIdentifier::parse(&input.identifier)?;
        let password = presented_password(input.password, "password")?;
        let ip_address = input.device.ip_address.clone();

        if self.lockout.check_locked(&identifier).await? {
            tracing::info!(identifier = %identifier, "Sign-in refused: account locked");
            return Err(AuthError::AccountLocked);
        }

        // Deleted identities are indistinguishable from unknown ones
        let identity = match self.store.find_identity_by_identifier(&identifier).await? {
            Some(identity) if identity.status != IdentityStatus::Deleted => identity,
            _ => {
                self.lockout
                    .record_failure(
                        &identifier,
                        FailedAttempt {
                            user_id: None,
                            ip_address,
                        },
                    )
                    .await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !identity
            .credential_hash
            .verify(&password, self.config.pepper())
        {
            self.lockout
                .record_failure(
                    &identifier,
                    FailedAttempt {
                        user_id: Some(identity.id),
                        ip_address,
                    },
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        if !identity.can_login() {
            tracing::info!(user_id = %identity.id, status = %identity.status, "Sign-in refused");
            return Err(AuthError::AccountSuspended);
        }

        if identity.two_factor_enabled {
            self.check_two_factor(
                &identity,
                &identifier,
                input.two_factor_code.as_deref(),
                ip_address.clone(),
            )
            .await?;
        }

        self.lockout.clear_failures(&identifier).await;

        let effective = self.resolver.resolve(&identity).await?;
        let now = self.clock.now();
        let session_id = SessionId::new();
        let expires_at = now + self.config.refresh_ttl();

        let tokens = self.tokens.generate_token_pair(
            &AccessClaims {
                user_id: identity.id,
                email: identity.email.clone(),
                kind: identity.kind,
                roles: effective.roles.clone(),
                permissions: effective.permissions.clone(),
                session_id,
            },
            expires_at,
        )?;

        let session = self
            .sessions
            .create_session(NewSession {
                session_id,
                user_id: identity.id,
                token_hash: TokenHash::of(&tokens.access_token),
                refresh_hash: TokenHash::of(&tokens.refresh_token),
                device: input.device,
                expires_at,
            })
            .await?;

        let mut identity = identity;
        match self.store.record_login(&identity.id, now).await {
            Ok(()) => {
                identity.last_login_at = Some(now);
                identity.login_count += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.id, "Failed to record login");
            }
        }

        self.check_concurrent_sessions(&identity, session_id, ip_address)
            .await;

        tracing::info!(
            user_id = %identity.id,
            session_id = %session_id,
            kind = %identity.kind,
            "User signed in"
        );

        Ok(SignInOutput {
            tokens,
            session,
            profile: identity.profile(),
            roles: effective.roles,
            permissions: effective.permissions,
        })
    }

    async fn check_two_factor(
        &self,
        identity: &Identity,
        identifier: &LoginIdentifier,
        code: Option<&str>,
        ip_address: Option<String>,
    ) -> AuthResult<()> {
        let Some(code) = code.filter(|c| !c.trim().is_empty()) else {
            return Err(AuthError::TwoFactorRequired);
        };
        let secret = identity.two_factor_secret.as_ref().ok_or_else(|| {
            AuthError::Internal("Two-factor enabled without a secret".to_string())
        })?;

        let unix_time = u64::try_from(self.clock.now().timestamp()).unwrap_or_default();
        if secret.verify_at(code, &self.config.totp_issuer, &identity.email, unix_time)? {
            return Ok(());
        }

        self.lockout
            .record_failure(
                identifier,
                FailedAttempt {
                    user_id: Some(identity.id),
                    ip_address: ip_address.clone(),
                },
            )
            .await;
        self.events
            .record(
                NewSecurityEvent::new(
                    SecurityEventType::InvalidTwoFactor,
                    Severity::Medium,
                    "Invalid two-factor code at sign-in",
                )
                .for_user(Some(identity.id))
                .from_ip(ip_address)
                .with_context(SecurityEventContext {
                    identifier: Some(identifier.to_string()),
                    ..Default::default()
                }),
            )
            .await;
        Err(AuthError::InvalidTwoFactorCode)
    }

    /// Raise MULTIPLE_SESSIONS once the identity holds `threshold` or more
    async fn check_concurrent_sessions(
        &self,
        identity: &Identity,
        session_id: SessionId,
        ip_address: Option<String>,
    ) {
        let active = match self.sessions.get_active_sessions(&identity.id).await {
            Ok(sessions) => sessions.len(),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.id, "Failed to count sessions");
                return;
            }
        };
        if active < self.config.multiple_sessions_threshold {
            return;
        }

        self.events
            .record(
                NewSecurityEvent::new(
                    SecurityEventType::MultipleSessions,
                    Severity::Medium,
                    format!("{active} concurrent active sessions"),
                )
                .for_user(Some(identity.id))
                .from_ip(ip_address)
                .with_context(SecurityEventContext {
                    active_sessions: Some(active),
                    session_id: Some(session_id),
                    ..Default::default()
                }),
            )
            .await;
    }
}
