//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::id::{SecurityEventId, SessionId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::{SessionSummary, TokenPair, TotpSetupOutput};
use crate::domain::entity::{
    IdentityProfile, SecurityEvent, SecurityEventContext, SecurityEventType, SessionHandle,
    Severity,
};
use crate::domain::value_object::{IdentityKind, IdentityStatus, Permission, RoleId};

// ============================================================================
// Login
// ============================================================================

/// Client-supplied device details
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfoRequest {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub device_info: Option<DeviceInfoRequest>,
    /// TOTP code if 2FA is enabled
    #[serde(default)]
    pub two_factor_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

impl From<SessionHandle> for SessionResponse {
    fn from(handle: SessionHandle) -> Self {
        Self {
            session_id: handle.session_id,
            expires_at: handle.expires_at,
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub session: SessionResponse,
    pub user: ProfileResponse,
    pub roles: Vec<RoleId>,
    pub permissions: Vec<Permission>,
}

// ============================================================================
// Refresh
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ============================================================================
// Password
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Also returned by logout-all
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedSessionsResponse {
    pub revoked_sessions: u64,
}

// ============================================================================
// Profile / Sessions
// ============================================================================

/// Safe identity projection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub kind: IdentityKind,
    pub status: IdentityStatus,
    pub roles: Vec<RoleId>,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<IdentityProfile> for ProfileResponse {
    fn from(p: IdentityProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            display_name: p.display_name,
            kind: p.kind,
            status: p.status,
            roles: p.roles.into_iter().collect(),
            two_factor_enabled: p.two_factor_enabled,
            last_login_at: p.last_login_at,
            login_count: p.login_count,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryResponse {
    pub session_id: SessionId,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl From<SessionSummary> for SessionSummaryResponse {
    fn from(s: SessionSummary) -> Self {
        Self {
            session_id: s.session_id,
            device_id: s.device_id,
            device_name: s.device_name,
            user_agent: s.user_agent,
            ip_address: s.ip_address,
            last_activity_at: s.last_activity_at,
            expires_at: s.expires_at,
            created_at: s.created_at,
            is_current: s.is_current,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummaryResponse>,
}

// ============================================================================
// TOTP Setup
// ============================================================================

/// TOTP setup response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpSetupResponse {
    /// QR code as base64-encoded PNG
    pub qr_code: String,
    /// Secret for manual entry
    pub secret: String,
    /// otpauth:// URL
    pub otpauth_url: String,
}

impl From<TotpSetupOutput> for TotpSetupResponse {
    fn from(o: TotpSetupOutput) -> Self {
        Self {
            qr_code: o.qr_code_base64,
            secret: o.secret,
            otpauth_url: o.otpauth_url,
        }
    }
}

/// Body of /totp/verify and /totp/disable
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpCodeRequest {
    pub code: String,
}

// ============================================================================
// Security Events
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityEventQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEventResponse {
    pub event_id: SecurityEventId,
    pub user_id: Option<UserId>,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub description: String,
    pub ip_address: Option<String>,
    pub context: SecurityEventContext,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityEvent> for SecurityEventResponse {
    fn from(e: SecurityEvent) -> Self {
        Self {
            event_id: e.event_id,
            user_id: e.user_id,
            event_type: e.event_type,
            severity: e.severity,
            description: e.description,
            ip_address: e.ip_address,
            context: e.context,
            resolved: e.resolved,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEventsResponse {
    pub events: Vec<SecurityEventResponse>,
}
