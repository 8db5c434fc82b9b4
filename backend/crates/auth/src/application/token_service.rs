//! Token Service
//!
//! Issues, verifies and rotates HS256 token pairs.
//!
//! - The access token carries the caller's roles and permissions; only its
//!   SHA-256 is stored, as the session's `token_hash`.
//! - The refresh token carries `ath`, the hash of the access token minted
//!   with it, and a random `jti`, so no two refresh tokens are alike even
//!   when minted in the same second. Its hash is the session's
//!   `refresh_hash`; rotation compares-and-swaps that hash, so each refresh
//!   token works exactly once.
//! - Both lifetimes are capped at the session's absolute expiry.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::{SessionId, UserId};
use platform::clock::Clock;
use platform::jwt::{Audience, decode_hs256, encode_hs256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::application::permission_resolver::{PermissionResolver, has_permission};
use crate::application::session_registry::SessionRegistry;
use crate::domain::entity::{RevokeReason, SessionState};
use crate::domain::repository::{AuthStore, CredentialStore, SessionStore};
use crate::domain::value_object::{IdentityKind, Permission, RoleId, TokenHash};
use crate::error::{AuthError, AuthResult};

const TOKEN_TYPE_BEARER: &str = "Bearer";
const TOKEN_USE_REFRESH: &str = "refresh";

// ============================================================================
// Claims
// ============================================================================

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JwtPayload {
    pub sub: UserId,
    pub email: String,
    pub roles: Vec<RoleId>,
    pub permissions: Vec<Permission>,
    pub session_id: SessionId,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Refresh token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub session_id: SessionId,
    /// Random per token
    pub jti: String,
    /// SHA-256 hex of the access token issued alongside
    pub ath: String,
    pub token_use: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// What goes into a new access token
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub email: String,
    pub kind: IdentityKind,
    pub roles: BTreeSet<RoleId>,
    pub permissions: BTreeSet<Permission>,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct TokenVerification {
    pub valid: bool,
    pub expired: bool,
    /// Present when the signature checked out, including for expired tokens
    pub payload: Option<JwtPayload>,
    pub error: Option<String>,
}

impl TokenVerification {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Authenticated caller, attached to requests by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub session_id: SessionId,
    pub roles: BTreeSet<RoleId>,
    pub permissions: BTreeSet<Permission>,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn require_permissions(&self, required: &[Permission], require_all: bool) -> AuthResult<()> {
        if has_permission(&self.permissions, required, require_all) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                required = ?required,
                "Permission check failed"
            );
            Err(AuthError::PermissionDenied)
        }
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct TokenService<R>
where
    R: AuthStore,
{
    store: Arc<R>,
    sessions: SessionRegistry<R>,
    resolver: PermissionResolver<R>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<R> TokenService<R>
where
    R: AuthStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            sessions: SessionRegistry::new(store.clone(), clock.clone()),
            resolver: PermissionResolver::new(store.clone()),
            store,
            clock,
            config,
        }
    }

    pub fn generate_token_pair(
        &self,
        claims: &AccessClaims,
        session_expires_at: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        if session_expires_at <= now {
            return Err(AuthError::TokenExpired);
        }

        let access_exp = (now + self.config.access_ttl_for(claims.kind)).min(session_expires_at);
        let refresh_exp = (now + self.config.refresh_ttl()).min(session_expires_at);
        let iat = now.timestamp();

        let payload = JwtPayload {
            sub: claims.user_id,
            email: claims.email.clone(),
            roles: claims.roles.iter().cloned().collect(),
            permissions: claims.permissions.iter().cloned().collect(),
            session_id: claims.session_id,
            iat,
            exp: access_exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        let access_token = encode_hs256(&self.config.jwt_secret, &payload)
            .map_err(|e| AuthError::Internal(format!("Failed to sign access token: {e}")))?;

        let refresh = RefreshClaims {
            sub: claims.user_id,
            session_id: claims.session_id,
            jti: Uuid::new_v4().to_string(),
            ath: TokenHash::of(&access_token).as_str().to_string(),
            token_use: TOKEN_USE_REFRESH.to_string(),
            iat,
            exp: refresh_exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        let refresh_token = encode_hs256(&self.config.jwt_secret, &refresh)
            .map_err(|e| AuthError::Internal(format!("Failed to sign refresh token: {e}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: payload.exp - iat,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    /// Check signature, structure, issuer, audience and expiry.
    ///
    /// Does not look at the session; see [`TokenService::authenticate`].
    pub fn verify_access_token(&self, token: &str) -> TokenVerification {
        let payload: JwtPayload =
            match decode_hs256(token, &self.config.jwt_secret, self.expected_audience()) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(error = %e, "Access token rejected");
                    return TokenVerification::rejected(e.to_string());
                }
            };

        if payload.exp <= self.clock.now().timestamp() {
            return TokenVerification {
                valid: false,
                expired: true,
                payload: Some(payload),
                error: Some("token has expired".to_string()),
            };
        }

        TokenVerification {
            valid: true,
            expired: false,
            payload: Some(payload),
            error: None,
        }
    }

    /// Rotate a token pair.
    ///
    /// The new pair's hashes replace the session's `token_hash` and
    /// `refresh_hash` only if `refresh_hash` still matches the token
    /// presented here. Of two racing rotations with the same refresh token,
    /// exactly one wins; the other fails with `TokenInvalid`.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.decode_refresh(refresh_token)?;
        let now = self.clock.now();

        let session = self
            .sessions
            .get_session(&claims.session_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if session.user_id != claims.sub {
            return Err(AuthError::TokenInvalid);
        }
        match session.state(now) {
            SessionState::Revoked => return Err(AuthError::SessionRevoked),
            SessionState::Expired => return Err(AuthError::TokenExpired),
            SessionState::Created | SessionState::Active => {}
        }

        let presented = TokenHash::of(refresh_token);
        if !session.refresh_hash.matches(&presented)
            || !session.token_hash.matches(&TokenHash::from_hex(claims.ath))
        {
            tracing::warn!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                "Stale refresh token presented"
            );
            return Err(AuthError::TokenInvalid);
        }

        let identity = match self.store.find_identity(&claims.sub).await? {
            Some(identity) if identity.can_login() => identity,
            _ => {
                self.sessions
                    .revoke_session(&session.session_id, RevokeReason::IdentityInactive)
                    .await?;
                return Err(AuthError::SessionRevoked);
            }
        };

        let effective = self.resolver.resolve(&identity).await?;
        let pair = self.generate_token_pair(
            &AccessClaims {
                user_id: identity.id,
                email: identity.email.clone(),
                kind: identity.kind,
                roles: effective.roles,
                permissions: effective.permissions,
                session_id: session.session_id,
            },
            session.expires_at,
        )?;

        let swapped = self
            .store
            .swap_token_hashes(
                &session.session_id,
                &presented,
                &TokenHash::of(&pair.access_token),
                &TokenHash::of(&pair.refresh_token),
                now,
            )
            .await?;
        if !swapped {
            // Lost a race: either another rotation got there first or the
            // session ended in between.
            return match self.sessions.get_session(&session.session_id).await? {
                Some(current) if current.is_usable(now) => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        user_id = %session.user_id,
                        "Concurrent refresh lost the rotation"
                    );
                    Err(AuthError::TokenInvalid)
                }
                _ => Err(AuthError::SessionRevoked),
            };
        }

        tracing::info!(
            user_id = %identity.id,
            session_id = %session.session_id,
            "Token pair refreshed"
        );

        Ok(pair)
    }

    /// Verify an access token and the session it is bound to.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AuthContext> {
        let verification = self.verify_access_token(access_token);
        if verification.expired {
            return Err(AuthError::TokenExpired);
        }
        let payload = match verification.payload {
            Some(payload) if verification.valid => payload,
            _ => return Err(AuthError::TokenInvalid),
        };

        let session = self
            .sessions
            .get_session(&payload.session_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if session.user_id != payload.sub {
            return Err(AuthError::TokenInvalid);
        }
        match session.state(self.clock.now()) {
            SessionState::Revoked => return Err(AuthError::SessionRevoked),
            SessionState::Expired => return Err(AuthError::TokenExpired),
            SessionState::Created | SessionState::Active => {}
        }
        if !session.token_hash.matches_token(access_token) {
            return Err(AuthError::TokenInvalid);
        }

        if let Err(e) = self.sessions.touch_activity(&session.session_id).await {
            tracing::warn!(error = %e, session_id = %session.session_id, "Failed to touch session");
        }

        Ok(AuthContext {
            user_id: payload.sub,
            email: payload.email,
            session_id: payload.session_id,
            roles: payload.roles.into_iter().collect(),
            permissions: payload.permissions.into_iter().collect(),
        })
    }

    pub async fn revoke_all_user_tokens(&self, user_id: &UserId) -> AuthResult<u64> {
        self.sessions
            .revoke_all_for_user(user_id, None, RevokeReason::AllSessionsRevoked)
            .await
    }

    /// Revoke every session of `user_id` except `keep`
    pub async fn revoke_other_user_tokens(
        &self,
        user_id: &UserId,
        keep: &SessionId,
        reason: RevokeReason,
    ) -> AuthResult<u64> {
        self.sessions
            .revoke_all_for_user(user_id, Some(keep), reason)
            .await
    }

    fn decode_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        let claims: RefreshClaims =
            decode_hs256(token, &self.config.jwt_secret, self.expected_audience()).map_err(
                |e| {
                    tracing::debug!(error = %e, "Refresh token rejected");
                    AuthError::TokenInvalid
                },
            )?;

        if claims.token_use != TOKEN_USE_REFRESH {
            return Err(AuthError::TokenInvalid);
        }
        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    fn expected_audience(&self) -> Audience<'_> {
        Audience {
            issuer: &self.config.jwt_issuer,
            audience: &self.config.jwt_audience,
        }
    }
}
