//! Identity Status / Kind Value Objects
//!
//! Both are stored as `SMALLINT` and exposed to the API as lowercase codes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IdentityStatus
// ============================================================================

/// Account status, owned by the credential store.
///
/// - **Active**: may sign in
/// - **Suspended**: sign-in is refused with a distinct error
/// - **Deleted**: treated exactly like an unknown identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum IdentityStatus {
    #[default]
    Active = 0,
    Suspended = 1,
    Deleted = 2,
}

impl IdentityStatus {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    #[inline]
    pub const fn can_login(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Active),
            1 => Some(Self::Suspended),
            2 => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// IdentityKind
// ============================================================================

/// Which authentication surface the identity belongs to.
///
/// Admin identities get the longer access-token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum IdentityKind {
    #[default]
    Member = 0,
    Admin = 1,
}

impl IdentityKind {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Member),
            1 => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
