//! Permission Resolver
//!
//! Effective permissions are the union of every role's mapping plus the
//! identity's explicit grants. Nothing is cached: each call reads the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use kernel::id::UserId;

use crate::domain::entity::Identity;
use crate::domain::repository::{CredentialStore, RolePermissionStore};
use crate::domain::value_object::{EffectivePermissions, Permission, RoleId};
use crate::error::{AuthError, AuthResult};

pub struct PermissionResolver<R>
where
    R: CredentialStore + RolePermissionStore,
{
    store: Arc<R>,
}

impl<R> PermissionResolver<R>
where
    R: CredentialStore + RolePermissionStore,
{
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub async fn load_user_permissions(&self, user_id: &UserId) -> AuthResult<EffectivePermissions> {
        let identity = self
            .store
            .find_identity(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        self.resolve(&identity).await
    }

    /// Resolve for an identity that is already loaded
    pub async fn resolve(&self, identity: &Identity) -> AuthResult<EffectivePermissions> {
        let mut permissions = self.store.role_permissions(&identity.roles).await?;
        permissions.extend(identity.permission_grants.iter().cloned());

        Ok(EffectivePermissions {
            roles: identity.roles.clone(),
            permissions,
        })
    }
}

/// `require_all` selects AND over OR. An empty `required` always passes.
pub fn has_permission(
    granted: &BTreeSet<Permission>,
    required: &[Permission],
    require_all: bool,
) -> bool {
    if required.is_empty() {
        return true;
    }
    if require_all {
        required.iter().all(|p| granted.contains(p))
    } else {
        required.iter().any(|p| granted.contains(p))
    }
}

/// OR semantics. An empty `required` always passes.
pub fn has_role(user_roles: &BTreeSet<RoleId>, required: &[RoleId]) -> bool {
    required.is_empty() || required.iter().any(|r| user_roles.contains(r))
}
