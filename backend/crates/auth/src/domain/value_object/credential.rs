//! Credential Value Objects
//!
//! Domain wrappers over `platform::password`:
//! - [`presented_password`] for a password submitted to be checked
//! - [`new_password`] for a password the user wants to set (policy applies)
//! - [`CredentialHash`] for the stored Argon2id PHC string

use std::fmt;

use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};

use crate::error::{AuthError, AuthResult};

/// Normalize a submitted password without applying the policy.
///
/// Only emptiness is rejected, as a validation error on `field`.
pub fn presented_password(raw: String, field: &'static str) -> AuthResult<ClearTextPassword> {
    ClearTextPassword::for_verification(raw)
        .map_err(|_| AuthError::validation(field, "must not be empty"))
}

/// Apply the password policy to a password being set.
pub fn new_password(raw: String) -> AuthResult<ClearTextPassword> {
    ClearTextPassword::new(raw).map_err(|e| match e {
        PasswordPolicyError::EmptyOrWhitespace => {
            AuthError::validation("newPassword", "must not be empty")
        }
        other => AuthError::WeakPassword(other.to_string()),
    })
}

/// Stored password hash (Argon2id, PHC format)
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash(HashedPassword);

impl CredentialHash {
    pub fn hash(password: &ClearTextPassword, pepper: Option<&[u8]>) -> AuthResult<Self> {
        password
            .hash(pepper)
            .map(Self)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    pub fn from_phc_string(phc: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_phc_string(phc)
            .map(Self)
            .map_err(|e| AuthError::Internal(format!("Invalid credential hash: {}", e)))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        self.0.verify(password, pepper)
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHash([HASH])")
    }
}
