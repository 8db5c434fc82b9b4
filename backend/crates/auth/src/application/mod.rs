//! Application Layer
//!
//! Use cases and application services.

pub mod change_password;
pub mod config;
pub mod list_sessions;
pub mod lockout_guard;
pub mod permission_resolver;
pub mod profile;
pub mod security_events;
pub mod session_registry;
pub mod sign_in;
pub mod sign_out;
pub mod token_service;
pub mod totp_setup;

// Re-exports
pub use change_password::{ChangePasswordInput, ChangePasswordOutput, ChangePasswordUseCase};
pub use config::AuthConfig;
pub use list_sessions::{ListSessionsUseCase, SessionSummary};
pub use lockout_guard::{FailedAttempt, LockoutGuard};
pub use permission_resolver::{PermissionResolver, has_permission, has_role};
pub use profile::ProfileUseCase;
pub use security_events::SecurityEventRecorder;
pub use session_registry::SessionRegistry;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use token_service::{
    AccessClaims, AuthContext, JwtPayload, RefreshClaims, TokenPair, TokenService,
    TokenVerification,
};
pub use totp_setup::{TotpSetupOutput, TotpSetupUseCase};
