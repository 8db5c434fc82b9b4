//! List Sessions Use Case
//!
//! The caller's active sessions, flagged with the one making the request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::SessionId;
use platform::clock::Clock;

use crate::application::session_registry::SessionRegistry;
use crate::application::token_service::AuthContext;
use crate::domain::entity::Session;
use crate::domain::repository::SessionStore;
use crate::error::AuthResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionSummary {
    fn from_session(session: Session, current: &SessionId) -> Self {
        Self {
            is_current: session.session_id == *current,
            session_id: session.session_id,
            device_id: session.device_id,
            device_name: session.device_name,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

pub struct ListSessionsUseCase<R>
where
    R: SessionStore,
{
    sessions: SessionRegistry<R>,
}

impl<R> ListSessionsUseCase<R>
where
    R: SessionStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: SessionRegistry::new(store, clock),
        }
    }

    pub async fn execute(&self, ctx: &AuthContext) -> AuthResult<Vec<SessionSummary>> {
        let sessions = self.sessions.get_active_sessions(&ctx.user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionSummary::from_session(s, &ctx.session_id))
            .collect())
    }
}
