//! Domain Layer
//!
//! Contains entities, value objects, and store traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{Identity, Session, SecurityEvent};
pub use repository::{
    AuthStore, CounterStore, CredentialStore, EventStore, RolePermissionStore, SessionStore,
};
