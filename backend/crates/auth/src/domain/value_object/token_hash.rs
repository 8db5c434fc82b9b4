//! Token Hash
//!
//! Hex SHA-256 of an access or refresh token. Sessions persist only these, so a
//! leaked session table cannot be replayed as bearer tokens.

use std::fmt;

use platform::crypto::{constant_time_eq, sha256_hex};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn of(token: &str) -> Self {
        Self(sha256_hex(token.as_bytes()))
    }

    /// Wrap a stored hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &TokenHash) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }

    pub fn matches_token(&self, token: &str) -> bool {
        self.matches(&Self::of(token))
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 8 hex chars are enough to correlate log lines
        write!(f, "TokenHash({}…)", &self.0[..self.0.len().min(8)])
    }
}
