//! Entity Module

pub mod identity;
pub mod lockout;
pub mod security_event;
pub mod session;

pub use identity::{Identity, IdentityProfile};
pub use lockout::{AccountLock, FailureCounter, LockoutPolicy};
pub use security_event::{
    NewSecurityEvent, SecurityEvent, SecurityEventContext, SecurityEventType, Severity,
};
pub use session::{DeviceInfo, NewSession, RevokeReason, Session, SessionHandle, SessionState};
