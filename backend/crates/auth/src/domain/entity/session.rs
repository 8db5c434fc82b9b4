//! Session Entity
//!
//! One row per login. A session binds exactly one live token pair (by
//! hash) and moves through `Created → Active → {Expired | Revoked}`; both
//! end states are terminal. Expiry is absolute: activity never extends it.

use chrono::{DateTime, Utc};
use kernel::id::{SessionId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::TokenHash;

/// Client-supplied and request-derived device details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, no authenticated request seen yet
    Created,
    Active,
    Expired,
    Revoked,
}

impl SessionState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    Logout,
    PasswordChanged,
    /// Identity was suspended or deleted while the session was live
    IdentityInactive,
    AllSessionsRevoked,
}

impl RevokeReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::PasswordChanged => "password_changed",
            Self::IdentityInactive => "identity_inactive",
            Self::AllSessionsRevoked => "all_sessions_revoked",
        }
    }
}

impl std::fmt::Display for RevokeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for registering a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub token_hash: TokenHash,
    pub refresh_hash: TokenHash,
    pub device: DeviceInfo,
    pub expires_at: DateTime<Utc>,
}

/// What the caller gets back from registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Hash of the live access token
    pub token_hash: TokenHash,
    /// Hash of the live refresh token; compared-and-swapped on rotation
    pub refresh_hash: TokenHash,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
}

impl Session {
    pub fn from_new(new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: new.session_id,
            user_id: new.user_id,
            token_hash: new.token_hash,
            refresh_hash: new.refresh_hash,
            device_id: new.device.device_id,
            device_name: new.device.device_name,
            user_agent: new.device.user_agent,
            ip_address: new.device.ip_address,
            is_active: true,
            last_activity_at: now,
            expires_at: new.expires_at,
            created_at: now,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    /// Revocation wins over expiry.
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if !self.is_active || self.revoked_at.is_some() {
            SessionState::Revoked
        } else if now >= self.expires_at {
            SessionState::Expired
        } else if self.last_activity_at == self.created_at {
            SessionState::Created
        } else {
            SessionState::Active
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.state(now).is_terminal()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.session_id,
            expires_at: self.expires_at,
        }
    }

    /// Returns false if the session was already revoked.
    pub fn revoke(&mut self, reason: RevokeReason, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.revoked_at = Some(now);
        self.revoked_reason = Some(reason.as_str().to_string());
        true
    }

    /// Never moves `expires_at`. Terminal sessions are left untouched.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if self.is_usable(now) && now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(now: DateTime<Utc>) -> Session {
        Session::from_new(
            NewSession {
                session_id: SessionId::new(),
                user_id: UserId::new(),
                token_hash: TokenHash::of("token"),
                refresh_hash: TokenHash::of("refresh"),
                device: DeviceInfo::default(),
                expires_at: now + Duration::days(30),
            },
            now,
        )
    }

    #[test]
    fn test_state_machine() {
        let now = Utc::now();
        let mut s = session(now);
        assert_eq!(s.state(now), SessionState::Created);

        s.touch(now + Duration::minutes(5));
        assert_eq!(s.state(now + Duration::minutes(5)), SessionState::Active);
        assert_eq!(s.state(now + Duration::days(30)), SessionState::Expired);

        assert!(s.revoke(RevokeReason::Logout, now + Duration::minutes(6)));
        assert_eq!(s.state(now + Duration::minutes(6)), SessionState::Revoked);
        // Revoked stays revoked even after the expiry instant
        assert_eq!(s.state(now + Duration::days(31)), SessionState::Revoked);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let now = Utc::now();
        let mut s = session(now);
        assert!(s.revoke(RevokeReason::Logout, now));
        assert!(!s.revoke(RevokeReason::PasswordChanged, now + Duration::seconds(1)));
        assert_eq!(s.revoked_reason.as_deref(), Some("logout"));
        assert_eq!(s.revoked_at, Some(now));
    }

    #[test]
    fn test_touch_does_not_extend_expiry() {
        let now = Utc::now();
        let mut s = session(now);
        let expires = s.expires_at;
        s.touch(now + Duration::days(29));
        assert_eq!(s.expires_at, expires);
        assert_eq!(s.last_activity_at, now + Duration::days(29));
    }
}
