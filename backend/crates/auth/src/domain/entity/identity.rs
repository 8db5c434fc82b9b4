//! Identity Entity
//!
//! A member or admin account as seen by the auth core. The record is owned
//! by the credential store; the core only writes login bookkeeping, the
//! credential hash and the two-factor enrolment.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::value_object::{
    CredentialHash, IdentityKind, IdentityStatus, Permission, RoleId, TotpSecret,
};

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: UserId,
    /// Login identifier, stored lowercased
    pub email: String,
    pub display_name: Option<String>,
    pub kind: IdentityKind,
    pub credential_hash: CredentialHash,
    pub status: IdentityStatus,
    pub roles: BTreeSet<RoleId>,
    /// Explicit per-user permissions on top of the role mapping
    pub permission_grants: BTreeSet<Permission>,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<TotpSecret>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        email: &str,
        kind: IdentityKind,
        credential_hash: CredentialHash,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.trim().to_lowercase(),
            display_name: None,
            kind,
            credential_hash,
            status: IdentityStatus::Active,
            roles: BTreeSet::new(),
            permission_grants: BTreeSet::new(),
            two_factor_enabled: false,
            two_factor_secret: None,
            last_login_at: None,
            login_count: 0,
            created_at: now,
        }
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_grants<I, P>(mut self, grants: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permission_grants
            .extend(grants.into_iter().map(Into::into));
        self
    }

    pub fn with_status(mut self, status: IdentityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn can_login(&self) -> bool {
        self.status.can_login()
    }

    /// Safe projection: no hash, no secret.
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            kind: self.kind,
            status: self.status,
            roles: self.roles.clone(),
            two_factor_enabled: self.two_factor_enabled,
            last_login_at: self.last_login_at,
            login_count: self.login_count,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub kind: IdentityKind,
    pub status: IdentityStatus,
    pub roles: BTreeSet<RoleId>,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub created_at: DateTime<Utc>,
}
