//! HS256 JSON Web Tokens
//!
//! Thin layer over `jsonwebtoken`. Signature, algorithm, issuer and
//! audience are checked here. `exp` must be present but is not compared:
//! the caller checks it against its own clock, so an expired token can
//! still be told apart from a forged one.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unsupported algorithm")]
    UnsupportedAlg,
    #[error("unexpected issuer")]
    Issuer,
    #[error("unexpected audience")]
    Audience,
    #[error("missing claim: {0}")]
    MissingClaim(String),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unusable signing key")]
    Key,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                JwtError::UnsupportedAlg
            }
            ErrorKind::InvalidIssuer => JwtError::Issuer,
            ErrorKind::InvalidAudience => JwtError::Audience,
            ErrorKind::MissingRequiredClaim(claim) => JwtError::MissingClaim(claim.clone()),
            ErrorKind::InvalidKeyFormat => JwtError::Key,
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Expected `iss` / `aud` for decoding
#[derive(Debug, Clone, Copy)]
pub struct Audience<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
}

/// Sign `claims` as an HS256 JWT.
///
/// # Errors
///
/// Returns an error if the claims cannot be serialized.
pub fn encode_hs256<C: Serialize>(secret: &[u8], claims: &C) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(JwtError::from)
}

/// Verify an HS256 JWT and decode its claims.
///
/// # Errors
///
/// - [`JwtError::InvalidSignature`] if the MAC does not match
/// - [`JwtError::UnsupportedAlg`] if the header names anything but HS256
/// - [`JwtError::Issuer`] / [`JwtError::Audience`] on a foreign token
/// - [`JwtError::MissingClaim`] if `exp`, `iss` or `aud` is absent
/// - [`JwtError::Malformed`] for undecodable segments or claims
pub fn decode_hs256<C: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    expected: Audience<'_>,
) -> Result<C, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.set_issuer(&[expected.issuer]);
    validation.set_audience(&[expected.audience]);

    let data = jsonwebtoken::decode::<C>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(data.claims)
}
