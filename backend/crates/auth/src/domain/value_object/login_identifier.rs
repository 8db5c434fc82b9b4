//! Login Identifier
//!
//! Lockout counters are keyed by what the client typed, not by user id, so
//! guesses against unknown identifiers are penalized too. Normalization
//! (trim + lowercase) keeps `" Alice@Shop.test"` and `"alice@shop.test"` on
//! the same counter.

use std::fmt;

use crate::error::{AuthError, AuthResult};

/// RFC 5321 path limit
const MAX_IDENTIFIER_LENGTH: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoginIdentifier(String);

impl LoginIdentifier {
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AuthError::validation("identifier", "must not be empty"));
        }
        if normalized.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(AuthError::validation(
                "identifier",
                format!("must be at most {MAX_IDENTIFIER_LENGTH} characters"),
            ));
        }
        if normalized.chars().any(char::is_control) {
            return Err(AuthError::validation(
                "identifier",
                "contains control characters",
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let a = LoginIdentifier::parse("  Alice@Shop.TEST ").unwrap();
        let b = LoginIdentifier::parse("alice@shop.test").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "alice@shop.test");
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(matches!(
            LoginIdentifier::parse("   "),
            Err(AuthError::Validation { field: "identifier", .. })
        ));
        assert!(LoginIdentifier::parse(&"a".repeat(255)).is_err());
        assert!(LoginIdentifier::parse("u1\u{0000}").is_err());
    }
}
