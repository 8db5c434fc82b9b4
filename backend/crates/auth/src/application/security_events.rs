//! Security Event Recorder
//!
//! Best-effort: a failed write is logged and never fails the caller.

use std::sync::Arc;

use platform::clock::Clock;

use crate::domain::entity::{NewSecurityEvent, SecurityEvent, Severity};
use crate::domain::repository::EventStore;
use crate::error::AuthResult;

pub struct SecurityEventRecorder<R>
where
    R: EventStore,
{
    store: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> SecurityEventRecorder<R>
where
    R: EventStore,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(&self, event: NewSecurityEvent) {
        let event = SecurityEvent::from_new(event, self.clock.now());
        emit(&event);

        if let Err(e) = self.store.append_event(&event).await {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type,
                "Failed to persist security event"
            );
        }
    }

    pub async fn recent_events(&self, limit: u32) -> AuthResult<Vec<SecurityEvent>> {
        self.store.recent_events(limit).await
    }
}

fn emit(event: &SecurityEvent) {
    let user_id = event.user_id.map(|id| id.to_string());
    match event.severity {
        Severity::High | Severity::Critical => tracing::error!(
            event_type = %event.event_type,
            severity = %event.severity,
            user_id = ?user_id,
            ip = ?event.ip_address,
            "{}",
            event.description
        ),
        Severity::Medium => tracing::warn!(
            event_type = %event.event_type,
            severity = %event.severity,
            user_id = ?user_id,
            ip = ?event.ip_address,
            "{}",
            event.description
        ),
        Severity::Low => tracing::info!(
            event_type = %event.event_type,
            user_id = ?user_id,
            "{}",
            event.description
        ),
    }
}
