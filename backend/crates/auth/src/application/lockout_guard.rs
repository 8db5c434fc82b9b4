//! Lockout Guard
//!
//! Brute-force protection keyed by login identifier.
//!
//! `check_locked` is fail-closed: a store error denies the login.
//! `record_failure` and `clear_failures` are fail-open: store errors are
//! logged and the login flow carries on.

use std::sync::Arc;

use kernel::id::UserId;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::security_events::SecurityEventRecorder;
use crate::domain::entity::{NewSecurityEvent, SecurityEventContext, SecurityEventType, Severity};
use crate::domain::repository::{CounterStore, EventStore};
use crate::domain::value_object::LoginIdentifier;
use crate::error::AuthResult;

/// Who failed, when known
#[derive(Debug, Clone, Default)]
pub struct FailedAttempt {
    /// `None` when the identifier matched no identity
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
}

pub struct LockoutGuard<R>
where
    R: CounterStore + EventStore,
{
    store: Arc<R>,
    events: SecurityEventRecorder<R>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<R> LockoutGuard<R>
where
    R: CounterStore + EventStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            events: SecurityEventRecorder::new(store.clone(), clock.clone()),
            store,
            clock,
            config,
        }
    }

    pub async fn check_locked(&self, identifier: &LoginIdentifier) -> AuthResult<bool> {
        let lock = self
            .store
            .active_lock(identifier, self.clock.now())
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, identifier = %identifier, "Lock check failed");
            })?;
        Ok(lock.is_some())
    }

    pub async fn record_failure(&self, identifier: &LoginIdentifier, attempt: FailedAttempt) {
        let now = self.clock.now();
        let count = match self
            .store
            .increment_failure(identifier, now, self.config.failure_window())
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, identifier = %identifier, "Failed to record login failure");
                return;
            }
        };

        if count < self.config.lockout.max_failures {
            let event = NewSecurityEvent::new(
                SecurityEventType::FailedLogin,
                Severity::Low,
                "Failed login attempt",
            )
            .for_user(attempt.user_id)
            .from_ip(attempt.ip_address)
            .with_context(SecurityEventContext {
                identifier: Some(identifier.to_string()),
                attempt_count: Some(count),
                ..Default::default()
            });
            self.events.record(event).await;
            return;
        }

        let locked_until = now + self.config.lock_duration();
        if let Err(e) = self.store.set_lock(identifier, locked_until).await {
            tracing::warn!(error = %e, identifier = %identifier, "Failed to set account lock");
        }

        tracing::warn!(
            identifier = %identifier,
            attempts = count,
            locked_until = %locked_until,
            "Account locked after repeated failures"
        );

        let severity = if attempt.user_id.is_some() {
            Severity::Medium
        } else {
            Severity::High
        };
        let event = NewSecurityEvent::new(
            SecurityEventType::FailedLogin,
            severity,
            format!("Account locked after {count} failed login attempts"),
        )
        .for_user(attempt.user_id)
        .from_ip(attempt.ip_address)
        .with_context(SecurityEventContext {
            identifier: Some(identifier.to_string()),
            attempt_count: Some(count),
            locked_until: Some(locked_until),
            ..Default::default()
        });
        self.events.record(event).await;
    }

    pub async fn clear_failures(&self, identifier: &LoginIdentifier) {
        if let Err(e) = self.store.clear_failures(identifier).await {
            tracing::warn!(error = %e, identifier = %identifier, "Failed to clear login failures");
        }
    }

    pub async fn failure_count(&self, identifier: &LoginIdentifier) -> AuthResult<u32> {
        self.store.failure_count(identifier, self.clock.now()).await
    }
}
