//! Store Traits
//!
//! Persistence seams for the auth core. Implementations live in the infra
//! layer (`InMemoryAuthStore`, `PgAuthRepository`). Every time-dependent
//! query takes `now` from the caller so expiry follows the injected clock.
//!
//! Method names are unique across traits so a single backend can implement
//! all of them without call-site ambiguity.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SessionId, UserId};

use crate::domain::entity::{AccountLock, Identity, RevokeReason, SecurityEvent, Session};
use crate::domain::value_object::{
    CredentialHash, LoginIdentifier, Permission, RoleId, TokenHash, TotpSecret,
};
use crate::error::AuthResult;

/// Identity records (external collaborator)
#[trait_variant::make(CredentialStore: Send)]
pub trait LocalCredentialStore {
    async fn find_identity_by_identifier(
        &self,
        identifier: &LoginIdentifier,
    ) -> AuthResult<Option<Identity>>;

    async fn find_identity(&self, user_id: &UserId) -> AuthResult<Option<Identity>>;

    /// Set `last_login_at` and bump `login_count`
    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()>;

    async fn update_credential_hash(
        &self,
        user_id: &UserId,
        hash: &CredentialHash,
    ) -> AuthResult<()>;

    async fn update_two_factor(
        &self,
        user_id: &UserId,
        enabled: bool,
        secret: Option<&TotpSecret>,
    ) -> AuthResult<()>;
}

/// Role → permission mapping
#[trait_variant::make(RolePermissionStore: Send)]
pub trait LocalRolePermissionStore {
    /// Union of the permissions of every listed role. Unknown roles contribute nothing.
    async fn role_permissions(&self, roles: &BTreeSet<RoleId>) -> AuthResult<BTreeSet<Permission>>;
}

#[trait_variant::make(SessionStore: Send)]
pub trait LocalSessionStore {
    async fn insert_session(&self, session: &Session) -> AuthResult<()>;

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<Session>>;

    /// Active and unexpired sessions, most recent activity first
    async fn find_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>>;

    /// Replace the bound token pair, but only while the stored refresh hash
    /// still equals `expected_refresh` (compare-and-swap).
    ///
    /// Returns false when the pair was already rotated, or the session is
    /// no longer active or has expired.
    async fn swap_token_hashes(
        &self,
        session_id: &SessionId,
        expected_refresh: &TokenHash,
        token_hash: &TokenHash,
        refresh_hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Returns false when the session was already revoked (or does not exist).
    async fn revoke_session(
        &self,
        session_id: &SessionId,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    async fn revoke_user_sessions(
        &self,
        user_id: &UserId,
        except: Option<&SessionId>,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<u64>;

    async fn touch_session(&self, session_id: &SessionId, now: DateTime<Utc>) -> AuthResult<()>;

    /// Delete rows whose `expires_at` has passed
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Failure counters and account locks
#[trait_variant::make(CounterStore: Send)]
pub trait LocalCounterStore {
    /// Atomic read-modify-write; returns the count after this failure.
    async fn increment_failure(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<u32>;

    /// Count within the current window (0 if none or expired)
    async fn failure_count(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<u32>;

    async fn set_lock(
        &self,
        identifier: &LoginIdentifier,
        locked_until: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// The lock, if one is still in force at `now`
    async fn active_lock(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>>;

    /// Drop both the counter and any lock
    async fn clear_failures(&self, identifier: &LoginIdentifier) -> AuthResult<()>;
}

#[trait_variant::make(EventStore: Send)]
pub trait LocalEventStore {
    async fn append_event(&self, event: &SecurityEvent) -> AuthResult<()>;

    /// Newest first
    async fn recent_events(&self, limit: u32) -> AuthResult<Vec<SecurityEvent>>;
}

/// Every store the auth core talks to, served by one backend.
pub trait AuthStore:
    CredentialStore
    + RolePermissionStore
    + SessionStore
    + CounterStore
    + EventStore
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: CredentialStore
        + RolePermissionStore
        + SessionStore
        + CounterStore
        + EventStore
        + Send
        + Sync
        + 'static
{
}
