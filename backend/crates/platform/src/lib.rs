//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, Base64, constant-time compare)
//! - HS256 JSON Web Tokens (jsonwebtoken)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Injectable wall clock
//! - Client identification from request headers

pub mod client;
pub mod clock;
pub mod crypto;
pub mod jwt;
pub mod password;
