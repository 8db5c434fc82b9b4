//! In-Memory Store
//!
//! Every store trait over one `RwLock`ed state. Used by tests and local
//! development; read-modify-write operations hold the write lock for their
//! whole duration, which makes them atomic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SessionId, UserId};
use tokio::sync::RwLock;

use crate::domain::entity::{
    AccountLock, FailureCounter, Identity, RevokeReason, SecurityEvent, Session,
};
use crate::domain::repository::{
    CounterStore, CredentialStore, EventStore, RolePermissionStore, SessionStore,
};
use crate::domain::value_object::role::default_catalog;
use crate::domain::value_object::{
    CredentialHash, LoginIdentifier, Permission, RoleId, TokenHash, TotpSecret,
};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct MemoryState {
    identities: HashMap<UserId, Identity>,
    role_permissions: BTreeMap<RoleId, BTreeSet<Permission>>,
    sessions: HashMap<SessionId, Session>,
    counters: HashMap<LoginIdentifier, FailureCounter>,
    locks: HashMap<LoginIdentifier, AccountLock>,
    events: Vec<SecurityEvent>,
}

/// Clones share the same state.
#[derive(Clone)]
pub struct InMemoryAuthStore {
    state: Arc<RwLock<MemoryState>>,
    counters_unavailable: Arc<AtomicBool>,
}

impl Default for InMemoryAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthStore {
    /// Empty store seeded with the default role catalog
    pub fn new() -> Self {
        let state = MemoryState {
            role_permissions: default_catalog(),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            counters_unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn insert_identity(&self, identity: Identity) {
        self.state
            .write()
            .await
            .identities
            .insert(identity.id, identity);
    }

    pub async fn set_role_permissions(&self, role: RoleId, permissions: BTreeSet<Permission>) {
        self.state
            .write()
            .await
            .role_permissions
            .insert(role, permissions);
    }

    /// Make every counter/lock operation fail, as if that backend were down
    pub fn set_counters_unavailable(&self, unavailable: bool) {
        self.counters_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    fn counters_available(&self) -> AuthResult<()> {
        if self.counters_unavailable.load(Ordering::SeqCst) {
            Err(AuthError::Store("counter store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Credential Store
// ============================================================================

impl CredentialStore for InMemoryAuthStore {
    async fn find_identity_by_identifier(
        &self,
        identifier: &LoginIdentifier,
    ) -> AuthResult<Option<Identity>> {
        let state = self.state.read().await;
        Ok(state
            .identities
            .values()
            .find(|i| i.email == identifier.as_str())
            .cloned())
    }

    async fn find_identity(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        Ok(self.state.read().await.identities.get(user_id).cloned())
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.write().await;
        let identity = state
            .identities
            .get_mut(user_id)
            .ok_or(AuthError::NotFound)?;
        identity.last_login_at = Some(at);
        identity.login_count += 1;
        Ok(())
    }

    async fn update_credential_hash(
        &self,
        user_id: &UserId,
        hash: &CredentialHash,
    ) -> AuthResult<()> {
        let mut state = self.state.write().await;
        let identity = state
            .identities
            .get_mut(user_id)
            .ok_or(AuthError::NotFound)?;
        identity.credential_hash = hash.clone();
        Ok(())
    }

    async fn update_two_factor(
        &self,
        user_id: &UserId,
        enabled: bool,
        secret: Option<&TotpSecret>,
    ) -> AuthResult<()> {
        let mut state = self.state.write().await;
        let identity = state
            .identities
            .get_mut(user_id)
            .ok_or(AuthError::NotFound)?;
        identity.two_factor_enabled = enabled;
        identity.two_factor_secret = secret.cloned();
        Ok(())
    }
}

impl RolePermissionStore for InMemoryAuthStore {
    async fn role_permissions(&self, roles: &BTreeSet<RoleId>) -> AuthResult<BTreeSet<Permission>> {
        let state = self.state.read().await;
        Ok(roles
            .iter()
            .filter_map(|role| state.role_permissions.get(role))
            .flatten()
            .cloned()
            .collect())
    }
}

// ============================================================================
// Session Store
// ============================================================================

impl SessionStore for InMemoryAuthStore {
    async fn insert_session(&self, session: &Session) -> AuthResult<()> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&session.session_id) {
            return Err(AuthError::Store("duplicate session id".to_string()));
        }
        if state
            .sessions
            .values()
            .any(|s| s.token_hash == session.token_hash || s.refresh_hash == session.refresh_hash)
        {
            return Err(AuthError::Store("duplicate token hash".to_string()));
        }
        state.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        Ok(self.state.read().await.sessions.get(session_id).cloned())
    }

    async fn find_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.user_id == *user_id && s.is_usable(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(sessions)
    }

    async fn swap_token_hashes(
        &self,
        session_id: &SessionId,
        expected_refresh: &TokenHash,
        token_hash: &TokenHash,
        refresh_hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.write().await;
        if state
            .sessions
            .values()
            .any(|s| s.session_id != *session_id && s.token_hash == *token_hash)
        {
            return Err(AuthError::Store("duplicate token hash".to_string()));
        }
        match state.sessions.get_mut(session_id) {
            Some(session)
                if session.is_usable(now) && session.refresh_hash.matches(expected_refresh) =>
            {
                session.token_hash = token_hash.clone();
                session.refresh_hash = refresh_hash.clone();
                session.touch(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_session(
        &self,
        session_id: &SessionId,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .sessions
            .get_mut(session_id)
            .is_some_and(|s| s.revoke(reason, now)))
    }

    async fn revoke_user_sessions(
        &self,
        user_id: &UserId,
        except: Option<&SessionId>,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for session in state.sessions.values_mut() {
            if session.user_id != *user_id || Some(&session.session_id) == except {
                continue;
            }
            if session.is_usable(now) && session.revoke(reason, now) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn touch_session(&self, session_id: &SessionId, now: DateTime<Utc>) -> AuthResult<()> {
        if let Some(session) = self.state.write().await.sessions.get_mut(session_id) {
            session.touch(now);
        }
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

// ============================================================================
// Counter Store
// ============================================================================

impl CounterStore for InMemoryAuthStore {
    async fn increment_failure(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<u32> {
        self.counters_available()?;
        let mut state = self.state.write().await;
        let next = FailureCounter::incremented(state.counters.get(identifier), identifier, now, window);
        let count = next.count;
        state.counters.insert(identifier.clone(), next);
        Ok(count)
    }

    async fn failure_count(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<u32> {
        self.counters_available()?;
        let state = self.state.read().await;
        Ok(state
            .counters
            .get(identifier)
            .filter(|c| !c.is_expired(now))
            .map_or(0, |c| c.count))
    }

    async fn set_lock(
        &self,
        identifier: &LoginIdentifier,
        locked_until: DateTime<Utc>,
    ) -> AuthResult<()> {
        self.counters_available()?;
        self.state.write().await.locks.insert(
            identifier.clone(),
            AccountLock {
                identifier: identifier.clone(),
                locked_until,
            },
        );
        Ok(())
    }

    async fn active_lock(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>> {
        self.counters_available()?;
        let state = self.state.read().await;
        Ok(state
            .locks
            .get(identifier)
            .filter(|lock| lock.is_active(now))
            .cloned())
    }

    async fn clear_failures(&self, identifier: &LoginIdentifier) -> AuthResult<()> {
        self.counters_available()?;
        let mut state = self.state.write().await;
        state.counters.remove(identifier);
        state.locks.remove(identifier);
        Ok(())
    }
}

impl EventStore for InMemoryAuthStore {
    async fn append_event(&self, event: &SecurityEvent) -> AuthResult<()> {
        self.state.write().await.events.push(event.clone());
        Ok(())
    }

    async fn recent_events(&self, limit: u32) -> AuthResult<Vec<SecurityEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
