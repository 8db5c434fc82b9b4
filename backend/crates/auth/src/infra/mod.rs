//! Infrastructure Layer
//!
//! Store implementations: PostgreSQL for deployments, in-memory for tests
//! and local development.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAuthStore;
pub use postgres::PgAuthRepository;
