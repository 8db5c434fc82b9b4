//! Lockout Entities
//!
//! Failure counters and account locks are keyed by [`LoginIdentifier`] and
//! expire on their own; a lock has a TTL independent of its counter.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::value_object::LoginIdentifier;

/// Brute-force lockout policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures within the window that trigger a lock
    pub max_failures: u32,
    /// Sliding window: every failure pushes the counter's expiry out
    pub failure_window: Duration,
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 3,
            failure_window: Duration::from_secs(3600),
            lock_duration: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCounter {
    pub identifier: LoginIdentifier,
    pub count: u32,
    pub window_expires_at: DateTime<Utc>,
}

impl FailureCounter {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_expires_at
    }

    /// Counter after one more failure at `now`.
    ///
    /// An expired window restarts at 1.
    pub fn incremented(
        previous: Option<&FailureCounter>,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> FailureCounter {
        let count = match previous {
            Some(counter) if !counter.is_expired(now) => counter.count.saturating_add(1),
            _ => 1,
        };
        FailureCounter {
            identifier: identifier.clone(),
            count,
            window_expires_at: now + window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLock {
    pub identifier: LoginIdentifier,
    pub locked_until: DateTime<Utc>,
}

impl AccountLock {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.locked_until
    }
}
