//! Auth Error Types
//!
//! Auth-specific variants that render through the unified
//! `kernel::error::AppError` problem document.
//!
//! Credential failures share one generic message so responses never reveal
//! whether an identifier exists. Infrastructure failures become 500s and are
//! never mistaken for a successful check.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, with the offending field
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked")]
    AccountLocked,

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Two-factor authentication required")]
    TwoFactorRequired,

    #[error("Invalid two-factor authentication code")]
    InvalidTwoFactorCode,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is invalid")]
    TokenInvalid,

    #[error("Session has been revoked")]
    SessionRevoked,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found")]
    NotFound,

    /// New password rejected by policy
    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-SQL store failure
    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation { .. } => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::InvalidTwoFactorCode
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::SessionRevoked => ErrorKind::Unauthorized,
            AuthError::AccountLocked => ErrorKind::Locked,
            AuthError::AccountSuspended | AuthError::PermissionDenied => ErrorKind::Forbidden,
            AuthError::TwoFactorRequired => ErrorKind::PreconditionRequired,
            AuthError::NotFound => ErrorKind::NotFound,
            AuthError::WeakPassword(_) => ErrorKind::UnprocessableEntity,
            AuthError::Database(_) | AuthError::Store(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation { .. } => "VALIDATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountLocked => "ACCOUNT_LOCKED",
            AuthError::AccountSuspended => "ACCOUNT_SUSPENDED",
            AuthError::TwoFactorRequired => "TWO_FACTOR_REQUIRED",
            AuthError::InvalidTwoFactorCode => "INVALID_TWO_FACTOR_CODE",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::SessionRevoked => "SESSION_REVOKED",
            AuthError::PermissionDenied => "PERMISSION_DENIED",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::Database(_) | AuthError::Store(_) | AuthError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::Database(_) | AuthError::Store(_) | AuthError::Internal(_)
        )
    }

    pub fn to_app_error(&self) -> AppError {
        let base = AppError::new(self.kind(), self.public_message()).with_code(self.code());
        match self {
            AuthError::Validation { field, message } => base.with_field(*field, message.clone()),
            AuthError::AccountLocked => base.with_action("Try again later"),
            AuthError::TwoFactorRequired => base.with_action("Submit twoFactorCode"),
            AuthError::TokenExpired | AuthError::SessionRevoked => {
                base.with_action("Sign in again")
            }
            _ => base,
        }
    }

    /// Infrastructure details stay in logs.
    fn public_message(&self) -> String {
        if self.is_infrastructure() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Store(msg) => {
                tracing::error!(message = %msg, "Auth store error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::AccountLocked => {
                tracing::warn!("Login attempt on locked account");
            }
            AuthError::SessionRevoked => {
                tracing::warn!("Revoked session presented");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<platform::client::BearerTokenError> for AuthError {
    fn from(_: platform::client::BearerTokenError) -> Self {
        AuthError::TokenInvalid
    }
}
