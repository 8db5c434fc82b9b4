//! Session Registry
//!
//! Server-side session lifecycle. Any number of concurrent sessions per
//! identity; expiry is absolute and never extended by activity.

use std::sync::Arc;

use kernel::id::{SessionId, UserId};
use platform::clock::Clock;

use crate::domain::entity::{NewSession, RevokeReason, Session, SessionHandle};
use crate::domain::repository::SessionStore;
use crate::error::{AuthError, AuthResult};

pub struct SessionRegistry<R>
where
    R: SessionStore,
{
    store: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> SessionRegistry<R>
where
    R: SessionStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_session(&self, new: NewSession) -> AuthResult<SessionHandle> {
        let now = self.clock.now();
        if new.expires_at <= now {
            return Err(AuthError::Internal(
                "Session expiry must be in the future".to_string(),
            ));
        }

        let session = Session::from_new(new, now);
        self.store.insert_session(&session).await?;

        tracing::debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            expires_at = %session.expires_at,
            "Session created"
        );

        Ok(session.handle())
    }

    pub async fn get_session(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        self.store.find_session(session_id).await
    }

    pub async fn get_active_sessions(&self, user_id: &UserId) -> AuthResult<Vec<Session>> {
        self.store
            .find_active_sessions(user_id, self.clock.now())
            .await
    }

    /// Revoking an already revoked session is a no-op.
    pub async fn revoke_session(
        &self,
        session_id: &SessionId,
        reason: RevokeReason,
    ) -> AuthResult<()> {
        let revoked = self
            .store
            .revoke_session(session_id, reason, self.clock.now())
            .await?;
        if revoked {
            tracing::info!(session_id = %session_id, reason = %reason, "Session revoked");
        }
        Ok(())
    }

    pub async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        except: Option<&SessionId>,
        reason: RevokeReason,
    ) -> AuthResult<u64> {
        let count = self
            .store
            .revoke_user_sessions(user_id, except, reason, self.clock.now())
            .await?;
        tracing::info!(user_id = %user_id, reason = %reason, count, "User sessions revoked");
        Ok(count)
    }

    pub async fn touch_activity(&self, session_id: &SessionId) -> AuthResult<()> {
        self.store.touch_session(session_id, self.clock.now()).await
    }

    /// Delete sessions past their absolute expiry
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let count = self.store.delete_expired_sessions(self.clock.now()).await?;
        if count > 0 {
            tracing::info!(count, "Expired sessions cleaned up");
        }
        Ok(count)
    }
}
