//! Scenario tests for the auth crate
//!
//! Services run against `InMemoryAuthStore` with a `ManualClock`.

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;

    use platform::clock::{Clock, ManualClock};
    use platform::password::ClearTextPassword;

    use crate::application::{
        AuthConfig, SignInInput, SignInOutput, SignInUseCase, TokenService,
    };
    use crate::domain::entity::{DeviceInfo, Identity, SecurityEvent, SecurityEventType};
    use crate::domain::repository::EventStore;
    use crate::domain::value_object::role::{ADMIN, CUSTOMER};
    use crate::domain::value_object::{CredentialHash, IdentityKind};
    use crate::error::AuthResult;
    use crate::infra::memory::InMemoryAuthStore;

    pub const PASSWORD: &str = "correct horse battery";

    pub struct Harness {
        pub store: Arc<InMemoryAuthStore>,
        pub clock: ManualClock,
        pub config: Arc<AuthConfig>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(AuthConfig::with_random_secret())
        }

        pub fn with_config(config: AuthConfig) -> Self {
            Self {
                store: Arc::new(InMemoryAuthStore::new()),
                clock: ManualClock::from_recent(),
                config: Arc::new(config),
            }
        }

        pub fn clock(&self) -> Arc<dyn Clock> {
            Arc::new(self.clock.clone())
        }

        pub fn hash(password: &str) -> CredentialHash {
            let password = ClearTextPassword::new(password.to_string()).unwrap();
            CredentialHash::hash(&password, None).unwrap()
        }

        pub async fn member(&self, email: &str) -> Identity {
            let identity = Identity::new(
                email,
                IdentityKind::Member,
                Self::hash(PASSWORD),
                self.clock.now(),
            )
            .with_roles([CUSTOMER]);
            self.store.insert_identity(identity.clone()).await;
            identity
        }

        pub async fn admin(&self, email: &str) -> Identity {
            let identity = Identity::new(
                email,
                IdentityKind::Admin,
                Self::hash(PASSWORD),
                self.clock.now(),
            )
            .with_roles([ADMIN]);
            self.store.insert_identity(identity.clone()).await;
            identity
        }

        pub fn sign_in(&self) -> SignInUseCase<InMemoryAuthStore> {
            SignInUseCase::new(self.store.clone(), self.clock(), self.config.clone())
        }

        pub fn tokens(&self) -> TokenService<InMemoryAuthStore> {
            TokenService::new(self.store.clone(), self.clock(), self.config.clone())
        }

        pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<SignInOutput> {
            self.login_with_code(identifier, password, None).await
        }

        pub async fn login_with_code(
            &self,
            identifier: &str,
            password: &str,
            code: Option<&str>,
        ) -> AuthResult<SignInOutput> {
            self.sign_in()
                .execute(SignInInput {
                    identifier: identifier.to_string(),
                    password: password.to_string(),
                    two_factor_code: code.map(str::to_string),
                    device: DeviceInfo {
                        device_name: Some("test".to_string()),
                        ip_address: Some("203.0.113.7".to_string()),
                        ..Default::default()
                    },
                })
                .await
        }

        pub async fn events_of(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
            self.store
                .recent_events(u32::MAX)
                .await
                .unwrap()
                .into_iter()
                .filter(|e| e.event_type == event_type)
                .collect()
        }
    }
}

#[cfg(test)]
mod lockout_tests {
    use std::sync::Arc;

    use chrono::Duration;
    use platform::clock::Clock;

    use super::fixtures::{Harness, PASSWORD};
    use crate::application::{FailedAttempt, LockoutGuard};
    use crate::domain::entity::{SecurityEventType, Severity};
    use crate::domain::value_object::LoginIdentifier;
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_three_failures_lock_for_thirty_minutes() {
        let h = Harness::new();
        h.member("alice@shop.test").await;

        for _ in 0..3 {
            let result = h.login("alice@shop.test", "wrong password").await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }

        // Correct password is refused while locked
        let result = h.login("alice@shop.test", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::AccountLocked)));

        let failed = h.events_of(SecurityEventType::FailedLogin).await;
        assert_eq!(failed.len(), 3);
        let lock_event = &failed[0];
        assert_eq!(lock_event.severity, Severity::Medium);
        assert_eq!(lock_event.context.attempt_count, Some(3));
        assert_eq!(
            lock_event.context.locked_until,
            Some(h.clock.now() + Duration::minutes(30))
        );
        assert!(failed[1..].iter().all(|e| e.severity == Severity::Low));

        h.clock.advance(Duration::minutes(30));
        assert!(h.login("alice@shop.test", PASSWORD).await.is_ok());

        let guard = LockoutGuard::new(h.store.clone(), h.clock(), h.config.clone());
        let id = LoginIdentifier::parse("alice@shop.test").unwrap();
        assert_eq!(guard.failure_count(&id).await.unwrap(), 0);
        assert!(!guard.check_locked(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_plain_identifier_lock_and_release() {
        let h = Harness::new();
        h.member("u1").await;

        for _ in 0..3 {
            h.clock.advance(Duration::minutes(10));
            let _ = h.login("u1", "not the password").await;
        }
        assert!(matches!(
            h.login("u1", PASSWORD).await,
            Err(AuthError::AccountLocked)
        ));

        h.clock.advance(Duration::minutes(29));
        assert!(matches!(
            h.login("u1", PASSWORD).await,
            Err(AuthError::AccountLocked)
        ));

        h.clock.advance(Duration::minutes(1));
        assert!(h.login("u1", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let h = Harness::new();
        h.member("bob@shop.test").await;

        for _ in 0..2 {
            let _ = h.login("bob@shop.test", "wrong password").await;
        }
        h.login("bob@shop.test", PASSWORD).await.unwrap();

        // Two more failures do not reach the threshold again
        for _ in 0..2 {
            let _ = h.login("bob@shop.test", "wrong password").await;
        }
        assert!(h.login("bob@shop.test", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_identifier_locks_with_high_severity() {
        let h = Harness::new();

        for _ in 0..3 {
            let result = h.login("ghost@shop.test", "whatever").await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
        assert!(matches!(
            h.login("ghost@shop.test", "whatever").await,
            Err(AuthError::AccountLocked)
        ));

        let failed = h.events_of(SecurityEventType::FailedLogin).await;
        assert_eq!(failed[0].severity, Severity::High);
        assert!(failed[0].user_id.is_none());
    }

    #[tokio::test]
    async fn test_identifier_is_normalized() {
        let h = Harness::new();
        h.member("carol@shop.test").await;

        let _ = h.login(" Carol@Shop.TEST", "wrong password").await;
        let _ = h.login("carol@shop.test ", "wrong password").await;
        let _ = h.login("CAROL@SHOP.TEST", "wrong password").await;

        assert!(matches!(
            h.login("carol@shop.test", PASSWORD).await,
            Err(AuthError::AccountLocked)
        ));
    }

    #[tokio::test]
    async fn test_failure_window_slides() {
        let h = Harness::new();
        h.member("dave@shop.test").await;

        let _ = h.login("dave@shop.test", "wrong password").await;
        h.clock.advance(Duration::minutes(50));
        let _ = h.login("dave@shop.test", "wrong password").await;
        h.clock.advance(Duration::minutes(50));
        let _ = h.login("dave@shop.test", "wrong password").await;

        // Each failure pushed the window out, so all three count
        assert!(matches!(
            h.login("dave@shop.test", PASSWORD).await,
            Err(AuthError::AccountLocked)
        ));
    }

    #[tokio::test]
    async fn test_counter_outage_fails_open_but_lock_check_fails_closed() {
        let h = Harness::new();
        h.member("erin@shop.test").await;
        let guard = LockoutGuard::new(h.store.clone(), h.clock(), h.config.clone());
        let id = LoginIdentifier::parse("erin@shop.test").unwrap();

        h.store.set_counters_unavailable(true);

        // Recording swallows the store error
        guard.record_failure(&id, FailedAttempt::default()).await;
        guard.clear_failures(&id).await;

        // Checking does not
        assert!(matches!(guard.check_locked(&id).await, Err(AuthError::Store(_))));
        let result = h.login("erin@shop.test", PASSWORD).await;
        assert!(result.as_ref().is_err_and(AuthError::is_infrastructure));

        h.store.set_counters_unavailable(false);
        assert!(h.login("erin@shop.test", PASSWORD).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        const ATTEMPTS: u32 = 20;

        let h = Harness::new();
        h.member("frank@shop.test").await;
        let guard = Arc::new(LockoutGuard::new(h.store.clone(), h.clock(), h.config.clone()));
        let id = LoginIdentifier::parse("frank@shop.test").unwrap();

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let guard = guard.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    guard.record_failure(&id, FailedAttempt::default()).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(guard.failure_count(&id).await.unwrap(), ATTEMPTS);
        assert!(guard.check_locked(&id).await.unwrap());
    }
}

#[cfg(test)]
mod token_tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::Duration;
    use platform::clock::Clock;

    use super::fixtures::{Harness, PASSWORD};
    use crate::application::SessionRegistry;
    use crate::domain::entity::{RevokeReason, SessionState};
    use crate::domain::repository::SessionStore;
    use crate::domain::value_object::role::CUSTOMER;
    use crate::domain::value_object::{IdentityStatus, Permission, RoleId};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_generated_token_verifies() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();

        let verification = h.tokens().verify_access_token(&out.tokens.access_token);
        assert!(verification.valid);
        let payload = verification.payload.unwrap();
        assert_eq!(payload.sub, alice.id);
        assert_eq!(payload.session_id, out.session.session_id);
        assert_eq!(payload.email, "alice@shop.test");
        assert!(payload.permissions.contains(&Permission::from("cart:write")));
        assert_eq!(payload.exp - payload.iat, 3600);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_old_refresh_token_fails() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let tokens = h.tokens();

        h.clock.advance(Duration::seconds(5));
        let rotated = tokens.refresh_token(&out.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.access_token, out.tokens.access_token);

        assert!(matches!(
            tokens.refresh_token(&out.tokens.refresh_token).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            tokens.authenticate(&out.tokens.access_token).await,
            Err(AuthError::TokenInvalid)
        ));

        let ctx = tokens.authenticate(&rotated.access_token).await.unwrap();
        assert_eq!(ctx.session_id, out.session.session_id);

        h.clock.advance(Duration::seconds(5));
        assert!(tokens.refresh_token(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_same_second_refresh_cannot_be_replayed() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let tokens = h.tokens();

        // No clock movement between any of these calls
        let rotated = tokens.refresh_token(&out.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, out.tokens.refresh_token);

        assert!(matches!(
            tokens.refresh_token(&out.tokens.refresh_token).await,
            Err(AuthError::TokenInvalid)
        ));

        let again = tokens.refresh_token(&rotated.refresh_token).await.unwrap();
        assert!(matches!(
            tokens.refresh_token(&rotated.refresh_token).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(tokens.authenticate(&again.access_token).await.is_ok());

        let session = h
            .store
            .find_session(&out.session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(session.refresh_hash.matches_token(&again.refresh_token));
        assert!(session.is_active);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_refreshes_have_one_winner() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let tokens = Arc::new(h.tokens());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                let refresh = out.tokens.refresh_token.clone();
                tokio::spawn(async move { tokens.refresh_token(&refresh).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(pair) => winners.push(pair),
                Err(e) => assert!(matches!(e, AuthError::TokenInvalid), "unexpected {e:?}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert!(tokens.refresh_token(&winners[0].refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoked_session_never_refreshes() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let tokens = h.tokens();

        assert_eq!(tokens.revoke_all_user_tokens(&alice.id).await.unwrap(), 1);

        assert!(matches!(
            tokens.refresh_token(&out.tokens.refresh_token).await,
            Err(AuthError::SessionRevoked)
        ));
        assert!(matches!(
            tokens.authenticate(&out.tokens.access_token).await,
            Err(AuthError::SessionRevoked)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_cannot_refresh() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();

        h.clock.advance(Duration::days(30));
        assert!(matches!(
            h.tokens().refresh_token(&out.tokens.refresh_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_rejected() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();

        h.clock.advance(Duration::hours(1));
        assert!(matches!(
            h.tokens().authenticate(&out.tokens.access_token).await,
            Err(AuthError::TokenExpired)
        ));
        // The refresh token is still good
        assert!(h.tokens().refresh_token(&out.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_suspended_identity_loses_session_on_refresh() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();

        h.store
            .insert_identity(alice.clone().with_status(IdentityStatus::Suspended))
            .await;

        assert!(matches!(
            h.tokens().refresh_token(&out.tokens.refresh_token).await,
            Err(AuthError::SessionRevoked)
        ));

        let registry = SessionRegistry::new(h.store.clone(), h.clock());
        let session = registry
            .get_session(&out.session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.state(h.clock.now()), SessionState::Revoked);
        assert_eq!(
            session.revoked_reason.as_deref(),
            Some(RevokeReason::IdentityInactive.as_str())
        );
    }

    #[tokio::test]
    async fn test_refresh_picks_up_permission_changes() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();

        let perms: BTreeSet<Permission> = [Permission::from("reviews:write")].into_iter().collect();
        h.store
            .set_role_permissions(RoleId::from(CUSTOMER), perms)
            .await;

        h.clock.advance(Duration::seconds(1));
        let rotated = h
            .tokens()
            .refresh_token(&out.tokens.refresh_token)
            .await
            .unwrap();
        let payload = h
            .tokens()
            .verify_access_token(&rotated.access_token)
            .payload
            .unwrap();
        assert_eq!(payload.permissions, vec![Permission::from("reviews:write")]);
    }

    #[tokio::test]
    async fn test_authenticate_marks_session_active() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let registry = SessionRegistry::new(h.store.clone(), h.clock());

        let session = registry.get_session(&out.session.session_id).await.unwrap().unwrap();
        assert_eq!(session.state(h.clock.now()), SessionState::Created);

        h.clock.advance(Duration::minutes(1));
        h.tokens().authenticate(&out.tokens.access_token).await.unwrap();

        let session = registry.get_session(&out.session.session_id).await.unwrap().unwrap();
        assert_eq!(session.state(h.clock.now()), SessionState::Active);
        assert_eq!(session.expires_at, out.session.expires_at);
    }

    #[tokio::test]
    async fn test_garbage_tokens() {
        let h = Harness::new();
        let tokens = h.tokens();
        assert!(matches!(tokens.authenticate("nope").await, Err(AuthError::TokenInvalid)));
        assert!(matches!(tokens.refresh_token("a.b.c").await, Err(AuthError::TokenInvalid)));
        assert!(!tokens.verify_access_token("").valid);
    }
}

#[cfg(test)]
mod session_tests {
    use chrono::Duration;
    use kernel::id::{SessionId, UserId};
    use platform::clock::Clock;

    use super::fixtures::{Harness, PASSWORD};
    use crate::application::{
        ChangePasswordInput, ChangePasswordUseCase, ListSessionsUseCase, SessionRegistry,
        SignOutUseCase,
    };
    use crate::domain::entity::{DeviceInfo, NewSession, RevokeReason, SecurityEventType, Severity};
    use crate::domain::value_object::TokenHash;
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_third_session_raises_one_multiple_sessions_event() {
        let h = Harness::new();
        h.member("alice@shop.test").await;

        h.login("alice@shop.test", PASSWORD).await.unwrap();
        h.login("alice@shop.test", PASSWORD).await.unwrap();
        assert!(h.events_of(SecurityEventType::MultipleSessions).await.is_empty());

        let third = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let events = h.events_of(SecurityEventType::MultipleSessions).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Medium);
        assert_eq!(events[0].context.active_sessions, Some(3));
        assert_eq!(events[0].context.session_id, Some(third.session.session_id));
    }

    #[tokio::test]
    async fn test_logout_revokes_only_current_session() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let first = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let second = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let tokens = h.tokens();

        let sign_out = SignOutUseCase::new(h.store.clone(), h.clock(), h.config.clone());
        sign_out.execute(&first.tokens.access_token).await.unwrap();
        // Second logout with the same token is a no-op
        sign_out.execute(&first.tokens.access_token).await.unwrap();
        sign_out.execute("not-a-token").await.unwrap();

        assert!(matches!(
            tokens.authenticate(&first.tokens.access_token).await,
            Err(AuthError::SessionRevoked)
        ));
        let ctx = tokens.authenticate(&second.tokens.access_token).await.unwrap();

        let sessions = ListSessionsUseCase::new(h.store.clone(), h.clock())
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_current);
        assert_eq!(sessions[0].ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_logout_all_keeps_current() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let current = h.login("alice@shop.test", PASSWORD).await.unwrap();
        h.login("alice@shop.test", PASSWORD).await.unwrap();
        h.login("alice@shop.test", PASSWORD).await.unwrap();

        let ctx = h.tokens().authenticate(&current.tokens.access_token).await.unwrap();
        let sign_out = SignOutUseCase::new(h.store.clone(), h.clock(), h.config.clone());
        assert_eq!(sign_out.execute_all(&ctx).await.unwrap(), 2);
        assert!(h.tokens().authenticate(&current.tokens.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_revokes_other_sessions() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let current = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let other = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let ctx = h.tokens().authenticate(&current.tokens.access_token).await.unwrap();

        let use_case = ChangePasswordUseCase::new(h.store.clone(), h.clock(), h.config.clone());
        let output = use_case
            .execute(
                &ctx,
                ChangePasswordInput {
                    current_password: PASSWORD.to_string(),
                    new_password: "a much better passphrase".to_string(),
                    ip_address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(output.revoked_sessions, 1);

        assert!(h.tokens().authenticate(&current.tokens.access_token).await.is_ok());
        assert!(matches!(
            h.tokens().refresh_token(&other.tokens.refresh_token).await,
            Err(AuthError::SessionRevoked)
        ));

        assert!(matches!(
            h.login("alice@shop.test", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(h.login("alice@shop.test", "a much better passphrase").await.is_ok());

        let events = h.events_of(SecurityEventType::PasswordChange).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Low);
        assert_eq!(events[0].user_id, Some(alice.id));
        assert_eq!(events[0].context.revoked_sessions, Some(1));
    }

    #[tokio::test]
    async fn test_change_password_rejections() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let out = h.login("alice@shop.test", PASSWORD).await.unwrap();
        let ctx = h.tokens().authenticate(&out.tokens.access_token).await.unwrap();
        let use_case = ChangePasswordUseCase::new(h.store.clone(), h.clock(), h.config.clone());

        let input = |current: &str, new: &str| ChangePasswordInput {
            current_password: current.to_string(),
            new_password: new.to_string(),
            ip_address: None,
        };

        assert!(matches!(
            use_case.execute(&ctx, input("not my password", "fine new passphrase")).await,
            Err(AuthError::InvalidCredentials)
        ));
        let failed = h.events_of(SecurityEventType::PasswordChange).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].severity, Severity::Medium);

        assert!(matches!(
            use_case.execute(&ctx, input(PASSWORD, PASSWORD)).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            use_case.execute(&ctx, input(PASSWORD, "short")).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            use_case.execute(&ctx, input(PASSWORD, "password123")).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            use_case.execute(&ctx, input(PASSWORD, "   ")).await,
            Err(AuthError::Validation { field: "newPassword", .. })
        ));
    }

    #[tokio::test]
    async fn test_session_expiry_must_be_future() {
        let h = Harness::new();
        let registry = SessionRegistry::new(h.store.clone(), h.clock());

        let result = registry
            .create_session(NewSession {
                session_id: SessionId::new(),
                user_id: UserId::new(),
                token_hash: TokenHash::of("t"),
                refresh_hash: TokenHash::of("r"),
                device: DeviceInfo::default(),
                expires_at: h.clock.now(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_and_cleanup_removes_expired() {
        let h = Harness::new();
        let registry = SessionRegistry::new(h.store.clone(), h.clock());
        let user = UserId::new();

        let handle = registry
            .create_session(NewSession {
                session_id: SessionId::new(),
                user_id: user,
                token_hash: TokenHash::of("t"),
                refresh_hash: TokenHash::of("r"),
                device: DeviceInfo::default(),
                expires_at: h.clock.now() + Duration::hours(2),
            })
            .await
            .unwrap();
        assert_eq!(registry.get_active_sessions(&user).await.unwrap().len(), 1);

        registry
            .revoke_session(&handle.session_id, RevokeReason::Logout)
            .await
            .unwrap();
        registry
            .revoke_session(&handle.session_id, RevokeReason::PasswordChanged)
            .await
            .unwrap();
        let session = registry.get_session(&handle.session_id).await.unwrap().unwrap();
        assert_eq!(session.revoked_reason.as_deref(), Some("logout"));
        assert!(registry.get_active_sessions(&user).await.unwrap().is_empty());

        assert_eq!(registry.cleanup_expired().await.unwrap(), 0);
        h.clock.advance(Duration::hours(2));
        assert_eq!(registry.cleanup_expired().await.unwrap(), 1);
        assert!(registry.get_session(&handle.session_id).await.unwrap().is_none());
    }
}

#[cfg(test)]
mod sign_in_tests {
    use kernel::id::UserId;
    use platform::clock::Clock;

    use super::fixtures::{Harness, PASSWORD};
    use crate::application::{ProfileUseCase, TotpSetupUseCase};
    use crate::domain::entity::SecurityEventType;
    use crate::domain::value_object::{IdentityStatus, Permission, RoleId, TotpSecret};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_successful_login_output() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;

        let out = h.login("Alice@Shop.test", PASSWORD).await.unwrap();
        assert_eq!(out.tokens.token_type, "Bearer");
        assert_eq!(out.tokens.expires_in, 3600);
        assert_eq!(out.session.expires_at, h.clock.now() + chrono::Duration::days(30));
        assert_eq!(out.profile.id, alice.id);
        assert_eq!(out.profile.login_count, 1);
        assert_eq!(out.profile.last_login_at, Some(h.clock.now()));
        assert!(out.roles.contains(&RoleId::from("customer")));
        assert!(out.permissions.contains(&Permission::from("orders:read_own")));

        let profile = ProfileUseCase::new(h.store.clone())
            .execute(&alice.id)
            .await
            .unwrap();
        assert_eq!(profile.login_count, 1);
    }

    #[tokio::test]
    async fn test_admin_gets_longer_access_token() {
        let h = Harness::new();
        h.admin("root@shop.test").await;
        let out = h.login("root@shop.test", PASSWORD).await.unwrap();
        assert_eq!(out.tokens.expires_in, 8 * 3600);
        assert!(out.permissions.contains(&Permission::from("security_events:read")));
    }

    #[tokio::test]
    async fn test_suspended_and_deleted_identities() {
        let h = Harness::new();
        let sam = h.member("sam@shop.test").await;
        h.store
            .insert_identity(sam.with_status(IdentityStatus::Suspended))
            .await;
        assert!(matches!(
            h.login("sam@shop.test", PASSWORD).await,
            Err(AuthError::AccountSuspended)
        ));
        // Wrong password never reveals the status
        assert!(matches!(
            h.login("sam@shop.test", "wrong password").await,
            Err(AuthError::InvalidCredentials)
        ));

        let dee = h.member("dee@shop.test").await;
        h.store
            .insert_identity(dee.with_status(IdentityStatus::Deleted))
            .await;
        assert!(matches!(
            h.login("dee@shop.test", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let h = Harness::new();
        assert!(matches!(
            h.login("", PASSWORD).await,
            Err(AuthError::Validation { field: "identifier", .. })
        ));
        assert!(matches!(
            h.login("alice@shop.test", "  ").await,
            Err(AuthError::Validation { field: "password", .. })
        ));
    }

    #[tokio::test]
    async fn test_per_user_grants_are_added() {
        let h = Harness::new();
        let grace = h.member("grace@shop.test").await.with_grants(["reports:read"]);
        h.store.insert_identity(grace).await;

        let out = h.login("grace@shop.test", PASSWORD).await.unwrap();
        assert!(out.permissions.contains(&Permission::from("reports:read")));
        assert!(out.permissions.contains(&Permission::from("cart:write")));
    }

    #[tokio::test]
    async fn test_profile_of_unknown_user() {
        let h = Harness::new();
        let result = ProfileUseCase::new(h.store.clone()).execute(&UserId::new()).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_totp_enrolment_and_login() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let totp = TotpSetupUseCase::new(h.store.clone(), h.clock(), h.config.clone());
        let issuer = h.config.totp_issuer.clone();
        let unix_time = h.clock.now().timestamp() as u64;

        let setup = totp.setup(&alice.id).await.unwrap();
        assert!(setup.otpauth_url.starts_with("otpauth://totp/"));

        // Not enabled until confirmed
        assert!(h.login("alice@shop.test", PASSWORD).await.is_ok());

        let secret = TotpSecret::from_base32(setup.secret).unwrap();
        let code = secret.generate_at(&issuer, "alice@shop.test", unix_time);
        totp.verify(&alice.id, &code).await.unwrap();
        assert!(matches!(
            totp.setup(&alice.id).await,
            Err(AuthError::Validation { .. })
        ));

        assert!(matches!(
            h.login("alice@shop.test", PASSWORD).await,
            Err(AuthError::TwoFactorRequired)
        ));

        let wrong = format!("{:06}", (code.parse::<u32>().unwrap() + 1) % 1_000_000);
        assert!(matches!(
            h.login_with_code("alice@shop.test", PASSWORD, Some(&wrong)).await,
            Err(AuthError::InvalidTwoFactorCode)
        ));
        assert_eq!(h.events_of(SecurityEventType::InvalidTwoFactor).await.len(), 1);

        let out = h
            .login_with_code("alice@shop.test", PASSWORD, Some(&code))
            .await
            .unwrap();
        assert!(out.profile.two_factor_enabled);

        assert!(matches!(
            totp.disable(&alice.id, &wrong, None).await,
            Err(AuthError::InvalidTwoFactorCode)
        ));
        totp.disable(&alice.id, &code, None).await.unwrap();
        assert!(h.login("alice@shop.test", PASSWORD).await.is_ok());
    }
}

#[cfg(test)]
mod permission_tests {
    use kernel::id::UserId;

    use super::fixtures::Harness;
    use crate::application::{PermissionResolver, has_permission};
    use crate::domain::value_object::{Permission, RoleId};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_effective_permissions() {
        let h = Harness::new();
        let admin = h.admin("root@shop.test").await.with_grants(["reports:export"]);
        h.store.insert_identity(admin.clone()).await;

        let resolver = PermissionResolver::new(h.store.clone());
        let effective = resolver.load_user_permissions(&admin.id).await.unwrap();

        assert_eq!(effective.roles.len(), 1);
        assert!(effective.roles.contains(&RoleId::from("admin")));
        assert!(effective.permissions.contains(&Permission::from("reports:export")));
        assert!(effective.permissions.contains(&Permission::from("orders:refund")));
        assert!(!effective.permissions.contains(&Permission::from("admins:write")));

        let required = [
            Permission::from("orders:refund"),
            Permission::from("admins:write"),
        ];
        assert!(has_permission(&effective.permissions, &required, false));
        assert!(!has_permission(&effective.permissions, &required, true));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let h = Harness::new();
        let resolver = PermissionResolver::new(h.store.clone());
        assert!(matches!(
            resolver.load_user_permissions(&UserId::new()).await,
            Err(AuthError::NotFound)
        ));
    }
}

#[cfg(test)]
mod router_tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::fixtures::{Harness, PASSWORD};
    use crate::presentation::router::auth_router_generic;

    fn app(h: &Harness) -> Router {
        auth_router_generic((*h.store).clone(), (*h.config).clone(), h.clock())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn login(app: &Router, email: &str) -> Value {
        let (status, body) = send(
            app,
            post_json(
                "/login",
                json!({
                    "identifier": email,
                    "password": PASSWORD,
                    "deviceInfo": { "deviceName": "laptop" }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn test_login_response_shape() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let app = app(&h);

        let body = login(&app, "alice@shop.test").await;
        assert!(body["accessToken"].is_string());
        assert!(body["refreshToken"].is_string());
        assert_eq!(body["tokenType"], "Bearer");
        assert_eq!(body["expiresIn"], 3600);
        assert!(body["session"]["sessionId"].is_string());
        assert_eq!(body["user"]["email"], "alice@shop.test");
        assert_eq!(body["user"]["kind"], "member");
        assert!(body["user"].get("credentialHash").is_none());
        assert!(
            body["permissions"]
                .as_array()
                .unwrap()
                .contains(&json!("cart:write"))
        );
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let app = app(&h);

        let bad = json!({ "identifier": "alice@shop.test", "password": "wrong password" });
        let (status, body) = send(&app, post_json("/login", bad.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");

        send(&app, post_json("/login", bad.clone())).await;
        send(&app, post_json("/login", bad)).await;
        let (status, body) = send(
            &app,
            post_json("/login", json!({ "identifier": "alice@shop.test", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["code"], "ACCOUNT_LOCKED");

        let (status, body) = send(
            &app,
            post_json("/refresh", json!({ "refreshToken": "garbage" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn test_protected_routes_need_bearer() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let app = app(&h);

        let request = Request::builder()
            .uri("/profile")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let body = login(&app, "alice@shop.test").await;
        let token = body["accessToken"].as_str().unwrap();
        let (status, profile) = send(&app, get_with("/profile", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["email"], "alice@shop.test");
        assert_eq!(profile["loginCount"], 1);

        let (status, sessions) = send(&app, get_with("/sessions", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sessions["sessions"][0]["isCurrent"], true);
        assert_eq!(sessions["sessions"][0]["deviceName"], "laptop");
    }

    #[tokio::test]
    async fn test_logout_then_token_is_dead() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        let app = app(&h);

        let body = login(&app, "alice@shop.test").await;
        let token = body["accessToken"].as_str().unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, get_with("/profile", token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "SESSION_REVOKED");
    }

    #[tokio::test]
    async fn test_security_events_need_permission() {
        let h = Harness::new();
        h.member("alice@shop.test").await;
        h.admin("root@shop.test").await;
        let app = app(&h);

        let customer = login(&app, "alice@shop.test").await;
        let (status, body) = send(
            &app,
            get_with("/security-events", customer["accessToken"].as_str().unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PERMISSION_DENIED");

        send(
            &app,
            post_json(
                "/login",
                json!({ "identifier": "alice@shop.test", "password": "wrong password" }),
            ),
        )
        .await;

        let admin = login(&app, "root@shop.test").await;
        let (status, body) = send(
            &app,
            get_with("/security-events?limit=10", admin["accessToken"].as_str().unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventType"], "FAILED_LOGIN");
        assert_eq!(events[0]["severity"], "low");
    }

    #[tokio::test]
    async fn test_two_factor_required_status() {
        let h = Harness::new();
        let alice = h.member("alice@shop.test").await;
        let secret = crate::domain::value_object::TotpSecret::generate();
        let mut enrolled = alice.clone();
        enrolled.two_factor_enabled = true;
        enrolled.two_factor_secret = Some(secret);
        h.store.insert_identity(enrolled).await;
        let app = app(&h);

        let (status, body) = send(
            &app,
            post_json("/login", json!({ "identifier": "alice@shop.test", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(body["code"], "TWO_FACTOR_REQUIRED");
    }
}
