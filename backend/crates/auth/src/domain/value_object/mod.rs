//! Value Object Module

pub mod credential;
pub mod identity_status;
pub mod login_identifier;
pub mod role;
pub mod token_hash;
pub mod totp_secret;

pub use credential::CredentialHash;
pub use identity_status::{IdentityKind, IdentityStatus};
pub use login_identifier::LoginIdentifier;
pub use role::{EffectivePermissions, Permission, RoleId};
pub use token_hash::TokenHash;
pub use totp_secret::TotpSecret;
