//! TOTP Secret Value Object
//!
//! RFC 6238 time-based one-time passwords, Google Authenticator compatible:
//! SHA-1, 6 digits, 30 second step, one step of skew either side.
//!
//! Verification takes the Unix time explicitly so it follows the injected
//! clock rather than the system time.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpSecret {
    secret_base32: String,
}

impl TotpSecret {
    /// 160-bit random secret
    pub fn generate() -> Self {
        Self {
            secret_base32: Secret::generate_secret().to_encoded().to_string(),
        }
    }

    pub fn from_base32(secret: impl Into<String>) -> AuthResult<Self> {
        let secret_base32 = secret.into();
        Secret::Encoded(secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {:?}", e)))?;
        Ok(Self { secret_base32 })
    }

    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    fn to_totp(&self, issuer: &str, account_name: &str) -> AuthResult<TOTP> {
        let bytes = Secret::Encoded(self.secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {:?}", e)))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            bytes,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {}", e)))
    }

    /// Check a submitted code at `unix_time`.
    ///
    /// Anything that is not exactly six ASCII digits is rejected up front.
    pub fn verify_at(
        &self,
        code: &str,
        issuer: &str,
        account_name: &str,
        unix_time: u64,
    ) -> AuthResult<bool> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.to_totp(issuer, account_name)?.check(code, unix_time))
    }

    #[cfg(test)]
    pub fn generate_at(&self, issuer: &str, account_name: &str, unix_time: u64) -> String {
        self.to_totp(issuer, account_name)
            .map(|totp| totp.generate(unix_time))
            .unwrap_or_default()
    }

    /// QR code as base64 PNG
    pub fn qr_code_base64(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        self.to_totp(issuer, account_name)?
            .get_qr_base64()
            .map_err(|e| AuthError::Internal(format!("Failed to generate QR code: {}", e)))
    }

    pub fn otpauth_url(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        Ok(self.to_totp(issuer, account_name)?.get_url())
    }
}
