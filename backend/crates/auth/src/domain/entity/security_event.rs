//! Security Event Entity
//!
//! Append-only record of an authentication anomaly. Only the `resolved*`
//! fields are ever changed, by an operator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::id::{SecurityEventId, SessionId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    FailedLogin,
    MultipleSessions,
    PasswordChange,
    InvalidTwoFactor,
}

impl SecurityEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLogin => "FAILED_LOGIN",
            Self::MultipleSessions => "MULTIPLE_SESSIONS",
            Self::PasswordChange => "PASSWORD_CHANGE",
            Self::InvalidTwoFactor => "INVALID_TWO_FACTOR",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FAILED_LOGIN" => Ok(Self::FailedLogin),
            "MULTIPLE_SESSIONS" => Ok(Self::MultipleSessions),
            "PASSWORD_CHANGE" => Ok(Self::PasswordChange),
            "INVALID_TWO_FACTOR" => Ok(Self::InvalidTwoFactor),
            other => Err(format!("unknown security event type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// High and critical events page operators.
    pub const fn requires_alert(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Structured event details, stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEventContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_sessions: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewSecurityEvent {
    pub user_id: Option<UserId>,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub description: String,
    pub ip_address: Option<String>,
    pub context: SecurityEventContext,
}

impl NewSecurityEvent {
    pub fn new(
        event_type: SecurityEventType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: None,
            event_type,
            severity,
            description: description.into(),
            ip_address: None,
            context: SecurityEventContext::default(),
        }
    }

    pub fn for_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn from_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_context(mut self, context: SecurityEventContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub event_id: SecurityEventId,
    pub user_id: Option<UserId>,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub description: String,
    pub ip_address: Option<String>,
    pub context: SecurityEventContext,
    pub resolved: bool,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn from_new(new: NewSecurityEvent, now: DateTime<Utc>) -> Self {
        Self {
            event_id: SecurityEventId::new(),
            user_id: new.user_id,
            event_type: new.event_type,
            severity: new.severity,
            description: new.description,
            ip_address: new.ip_address,
            context: new.context,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
        }
    }
}
