//! Sign Out Use Case
//!
//! Revokes the session bound to the presented access token.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::session_registry::SessionRegistry;
use crate::application::token_service::{AuthContext, TokenService};
use crate::domain::entity::RevokeReason;
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<R>
where
    R: AuthStore,
{
    tokens: TokenService<R>,
    sessions: SessionRegistry<R>,
}

impl<R> SignOutUseCase<R>
where
    R: AuthStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            tokens: TokenService::new(store.clone(), clock.clone(), config),
            sessions: SessionRegistry::new(store, clock),
        }
    }

    /// Sign out from the current session.
    ///
    /// An expired access token still signs out. Tokens that fail
    /// verification, or no longer match their session, are ignored.
    pub async fn execute(&self, access_token: &str) -> AuthResult<()> {
        let verification = self.tokens.verify_access_token(access_token);
        let Some(payload) = verification.payload else {
            tracing::debug!(error = ?verification.error, "Sign-out with unverifiable token");
            return Ok(());
        };

        let Some(session) = self.sessions.get_session(&payload.session_id).await? else {
            return Ok(());
        };
        if session.user_id != payload.sub || !session.token_hash.matches_token(access_token) {
            return Ok(());
        }

        self.sessions
            .revoke_session(&session.session_id, RevokeReason::Logout)
            .await?;

        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.session_id,
            "User signed out"
        );
        Ok(())
    }

    /// Sign out from all sessions (except current)
    pub async fn execute_all(&self, ctx: &AuthContext) -> AuthResult<u64> {
        let revoked = self
            .tokens
            .revoke_other_user_tokens(&ctx.user_id, &ctx.session_id, RevokeReason::AllSessionsRevoked)
            .await?;

        tracing::info!(
            user_id = %ctx.user_id,
            revoked,
            "User signed out from all other sessions"
        );
        Ok(revoked)
    }
}
