//! Roles and Permissions
//!
//! A [`Permission`] is an opaque `resource:action` capability string. Roles
//! map to permission sets; the mapping itself is owned by the
//! `RolePermissionStore`. Both types order lexicographically so sets of them
//! serialize deterministically into JWT arrays.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `resource` part, if the value has the `resource:action` shape.
    pub fn resource(&self) -> Option<&str> {
        self.0.split_once(':').map(|(resource, _)| resource)
    }

    pub fn action(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, action)| action)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Roles plus the union of their permissions and per-user grants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissions {
    pub roles: BTreeSet<RoleId>,
    pub permissions: BTreeSet<Permission>,
}

// ============================================================================
// Default catalog
// ============================================================================

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const CATALOG_MANAGER: &str = "catalog_manager";
pub const ORDER_MANAGER: &str = "order_manager";
pub const SUPPORT: &str = "support";
pub const CUSTOMER: &str = "customer";

const CATALOG_PERMISSIONS: &[&str] = &[
    "products:read",
    "products:write",
    "products:delete",
    "categories:read",
    "categories:write",
    "brands:read",
    "brands:write",
];

const ORDER_PERMISSIONS: &[&str] = &["orders:read", "orders:write", "orders:refund"];

const MEMBER_ADMIN_PERMISSIONS: &[&str] = &["members:read", "members:write"];

const SECURITY_PERMISSIONS: &[&str] = &["security_events:read", "sessions:revoke"];

const CUSTOMER_PERMISSIONS: &[&str] = &[
    "profile:read",
    "profile:write",
    "cart:write",
    "orders:create",
    "orders:read_own",
];

/// Role → permission mapping seeded for a fresh store.
pub fn default_catalog() -> BTreeMap<RoleId, BTreeSet<Permission>> {
    fn set(groups: &[&[&str]]) -> BTreeSet<Permission> {
        groups
            .iter()
            .flat_map(|group| group.iter())
            .map(|p| Permission::from(*p))
            .collect()
    }

    BTreeMap::from([
        (
            RoleId::from(SUPER_ADMIN),
            set(&[
                CATALOG_PERMISSIONS,
                ORDER_PERMISSIONS,
                MEMBER_ADMIN_PERMISSIONS,
                SECURITY_PERMISSIONS,
                &["admins:read", "admins:write", "roles:write"],
            ]),
        ),
        (
            RoleId::from(ADMIN),
            set(&[
                CATALOG_PERMISSIONS,
                ORDER_PERMISSIONS,
                MEMBER_ADMIN_PERMISSIONS,
                SECURITY_PERMISSIONS,
                &["admins:read"],
            ]),
        ),
        (RoleId::from(CATALOG_MANAGER), set(&[CATALOG_PERMISSIONS])),
        (
            RoleId::from(ORDER_MANAGER),
            set(&[ORDER_PERMISSIONS, &["members:read"]]),
        ),
        (
            RoleId::from(SUPPORT),
            set(&[&["orders:read"], MEMBER_ADMIN_PERMISSIONS]),
        ),
        (RoleId::from(CUSTOMER), set(&[CUSTOMER_PERMISSIONS])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_parts() {
        let p = Permission::from("orders:refund");
        assert_eq!(p.resource(), Some("orders"));
        assert_eq!(p.action(), Some("refund"));
        assert_eq!(Permission::from("opaque").resource(), None);
    }

    #[test]
    fn test_default_catalog() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 6);

        let super_admin = &catalog[&RoleId::from(SUPER_ADMIN)];
        for perms in catalog.values() {
            assert!(perms.is_subset(super_admin) || perms.contains(&Permission::from("cart:write")));
        }
        assert!(catalog[&RoleId::from(SUPPORT)].contains(&Permission::from("members:write")));
        assert!(!catalog[&RoleId::from(CUSTOMER)].contains(&Permission::from("orders:refund")));
    }

    #[test]
    fn test_serializes_as_plain_strings() {
        let roles: BTreeSet<RoleId> = ["support", "admin"].into_iter().map(RoleId::from).collect();
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["admin","support"]"#);
    }
}
