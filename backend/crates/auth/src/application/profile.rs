//! Profile Use Case

use std::sync::Arc;

use kernel::id::UserId;

use crate::domain::entity::IdentityProfile;
use crate::domain::repository::CredentialStore;
use crate::error::{AuthError, AuthResult};

pub struct ProfileUseCase<R>
where
    R: CredentialStore,
{
    store: Arc<R>,
}

impl<R> ProfileUseCase<R>
where
    R: CredentialStore,
{
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// Safe projection of the identity, without hash or TOTP secret
    pub async fn execute(&self, user_id: &UserId) -> AuthResult<IdentityProfile> {
        self.store
            .find_identity(user_id)
            .await?
            .map(|identity| identity.profile())
            .ok_or(AuthError::NotFound)
    }
}
