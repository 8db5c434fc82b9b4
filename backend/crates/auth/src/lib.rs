//! Auth (Identity, Token & Session) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, store traits
//! - `application/` - Use cases and application services
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Email + password login for member and admin identities
//! - HS256 access / refresh token pairs with single-use refresh rotation
//! - Server-side sessions, several per identity, revocable individually
//! - Brute-force lockout keyed by login identifier
//! - Role-based permissions plus per-user grants
//! - TOTP two-factor authentication (Google Authenticator compatible)
//! - Security event log
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Only SHA-256 hashes of access tokens are stored
//! - A session's expiry is absolute; activity never extends it
//! - Lock checks fail closed, failure counting fails open

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{AuthContext, SessionRegistry, TokenService};
pub use error::{AuthError, AuthResult};
pub use infra::memory::InMemoryAuthStore;
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::{auth_router, auth_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod store {
    pub use crate::domain::repository::*;
    pub use crate::infra::memory::InMemoryAuthStore;
    pub use crate::infra::postgres::PgAuthRepository;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
