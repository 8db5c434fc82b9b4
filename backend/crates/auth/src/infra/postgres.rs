//! PostgreSQL Repository Implementations

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SecurityEventId, SessionId, UserId};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::entity::{
    AccountLock, Identity, RevokeReason, SecurityEvent, SecurityEventContext, Session,
};
use crate::domain::repository::{
    CounterStore, CredentialStore, EventStore, RolePermissionStore, SessionStore,
};
use crate::domain::value_object::{
    CredentialHash, IdentityKind, IdentityStatus, LoginIdentifier, Permission, RoleId, TokenHash,
    TotpSecret,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const IDENTITY_COLUMNS: &str = r#"
    i.user_id,
    i.email,
    i.display_name,
    i.identity_kind,
    i.identity_status,
    i.credential_hash,
    i.two_factor_enabled,
    i.two_factor_secret,
    i.last_login_at,
    i.login_count,
    i.created_at,
    ARRAY(
        SELECT r.role_id FROM identity_roles r
        WHERE r.user_id = i.user_id ORDER BY r.role_id
    ) AS roles,
    ARRAY(
        SELECT g.permission FROM identity_permission_grants g
        WHERE g.user_id = i.user_id ORDER BY g.permission
    ) AS grants
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    user_id,
    token_hash,
    refresh_hash,
    device_id,
    device_name,
    user_agent,
    ip_address,
    is_active,
    last_activity_at,
    expires_at,
    created_at,
    revoked_at,
    revoked_reason
"#;

// ============================================================================
// Credential Store Implementation
// ============================================================================

impl CredentialStore for PgAuthRepository {
    async fn find_identity_by_identifier(
        &self,
        identifier: &LoginIdentifier,
    ) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.email = $1"
        ))
        .bind(identifier.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRow::into_identity).transpose()
    }

    async fn find_identity(&self, user_id: &UserId) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRow::into_identity).transpose()
    }

    async fn record_login(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET last_login_at = $2,
                login_count = login_count + 1,
                updated_at = $2
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn update_credential_hash(
        &self,
        user_id: &UserId,
        hash: &CredentialHash,
    ) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET credential_hash = $2,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(hash.as_phc_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn update_two_factor(
        &self,
        user_id: &UserId,
        enabled: bool,
        secret: Option<&TotpSecret>,
    ) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET two_factor_enabled = $2,
                two_factor_secret = $3,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(enabled)
        .bind(secret.map(TotpSecret::as_base32))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }
}

impl RolePermissionStore for PgAuthRepository {
    async fn role_permissions(&self, roles: &BTreeSet<RoleId>) -> AuthResult<BTreeSet<Permission>> {
        if roles.is_empty() {
            return Ok(BTreeSet::new());
        }
        let role_ids: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();

        let permissions = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT permission FROM role_permissions WHERE role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions.into_iter().map(Permission::new).collect())
    }
}

// ============================================================================
// Session Store Implementation
// ============================================================================

impl SessionStore for PgAuthRepository {
    async fn insert_session(&self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                session_id,
                user_id,
                token_hash,
                refresh_hash,
                device_id,
                device_name,
                user_agent,
                ip_address,
                is_active,
                last_activity_at,
                expires_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(session.session_id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(session.token_hash.as_str())
        .bind(session.refresh_hash.as_str())
        .bind(&session.device_id)
        .bind(&session.device_name)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.is_active)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE session_id = $1"
        ))
        .bind(session_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn find_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM auth_sessions
            WHERE user_id = $1 AND is_active AND expires_at > $2
            ORDER BY last_activity_at DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn swap_token_hashes(
        &self,
        session_id: &SessionId,
        expected_refresh: &TokenHash,
        token_hash: &TokenHash,
        refresh_hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET token_hash = $3,
                refresh_hash = $4,
                last_activity_at = GREATEST(last_activity_at, $5)
            WHERE session_id = $1
              AND refresh_hash = $2
              AND is_active
              AND expires_at > $5
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(expected_refresh.as_str())
        .bind(token_hash.as_str())
        .bind(refresh_hash.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_session(
        &self,
        session_id: &SessionId,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET is_active = FALSE,
                revoked_at = $3,
                revoked_reason = $2
            WHERE session_id = $1 AND is_active
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(reason.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_user_sessions(
        &self,
        user_id: &UserId,
        except: Option<&SessionId>,
        reason: RevokeReason,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET is_active = FALSE,
                revoked_at = $4,
                revoked_reason = $3
            WHERE user_id = $1
              AND is_active
              AND expires_at > $4
              AND ($2::uuid IS NULL OR session_id <> $2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(except.map(|id| *id.as_uuid()))
        .bind(reason.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn touch_session(&self, session_id: &SessionId, now: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET last_activity_at = $2
            WHERE session_id = $1
              AND is_active
              AND expires_at > $2
              AND last_activity_at < $2
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Counter Store Implementation
// ============================================================================

impl CounterStore for PgAuthRepository {
    async fn increment_failure(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<u32> {
        // Single statement, so concurrent failures never lose an increment
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO login_failure_counters (identifier, count, window_expires_at)
            VALUES ($1, 1, $3)
            ON CONFLICT (identifier) DO UPDATE SET
                count = CASE
                    WHEN login_failure_counters.window_expires_at <= $2 THEN 1
                    ELSE login_failure_counters.count + 1
                END,
                window_expires_at = EXCLUDED.window_expires_at
            RETURNING count
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .bind(now + window)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u32)
    }

    async fn failure_count(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<u32> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT count FROM login_failure_counters
            WHERE identifier = $1 AND window_expires_at > $2
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map_or(0, |c| c.max(0) as u32))
    }

    async fn set_lock(
        &self,
        identifier: &LoginIdentifier,
        locked_until: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO account_locks (identifier, locked_until)
            VALUES ($1, $2)
            ON CONFLICT (identifier) DO UPDATE SET locked_until = EXCLUDED.locked_until
            "#,
        )
        .bind(identifier.as_str())
        .bind(locked_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_lock(
        &self,
        identifier: &LoginIdentifier,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>> {
        let locked_until = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT locked_until FROM account_locks
            WHERE identifier = $1 AND locked_until > $2
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(locked_until.map(|locked_until| AccountLock {
            identifier: identifier.clone(),
            locked_until,
        }))
    }

    async fn clear_failures(&self, identifier: &LoginIdentifier) -> AuthResult<()> {
        sqlx::query(
            r#"
            WITH cleared AS (
                DELETE FROM login_failure_counters WHERE identifier = $1
            )
            DELETE FROM account_locks WHERE identifier = $1
            "#,
        )
        .bind(identifier.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Event Store Implementation
// ============================================================================

impl EventStore for PgAuthRepository {
    async fn append_event(&self, event: &SecurityEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_events (
                event_id,
                user_id,
                event_type,
                severity,
                description,
                ip_address,
                context,
                resolved,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(event.user_id.map(UserId::into_uuid))
        .bind(event.event_type.as_str())
        .bind(event.severity.as_str())
        .bind(&event.description)
        .bind(&event.ip_address)
        .bind(Json(&event.context))
        .bind(event.resolved)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_events(&self, limit: u32) -> AuthResult<Vec<SecurityEvent>> {
        let rows = sqlx::query_as::<_, SecurityEventRow>(
            r#"
            SELECT
                event_id,
                user_id,
                event_type,
                severity,
                description,
                ip_address,
                context,
                resolved,
                resolved_by,
                resolved_at,
                created_at
            FROM security_events
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SecurityEventRow::into_event).collect()
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct IdentityRow {
    user_id: Uuid,
    email: String,
    display_name: Option<String>,
    identity_kind: i16,
    identity_status: i16,
    credential_hash: String,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    last_login_at: Option<DateTime<Utc>>,
    login_count: i64,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
    grants: Vec<String>,
}

impl IdentityRow {
    fn into_identity(self) -> AuthResult<Identity> {
        let kind = IdentityKind::from_id(self.identity_kind).ok_or_else(|| {
            AuthError::Internal(format!("Invalid identity_kind: {}", self.identity_kind))
        })?;
        let status = IdentityStatus::from_id(self.identity_status).ok_or_else(|| {
            AuthError::Internal(format!("Invalid identity_status: {}", self.identity_status))
        })?;
        let two_factor_secret = self
            .two_factor_secret
            .map(TotpSecret::from_base32)
            .transpose()?;

        Ok(Identity {
            id: UserId::from_uuid(self.user_id),
            email: self.email,
            display_name: self.display_name,
            kind,
            credential_hash: CredentialHash::from_phc_string(self.credential_hash)?,
            status,
            roles: self.roles.into_iter().map(RoleId::new).collect(),
            permission_grants: self.grants.into_iter().map(Permission::new).collect(),
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret,
            last_login_at: self.last_login_at,
            login_count: self.login_count,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    token_hash: String,
    refresh_hash: String,
    device_id: Option<String>,
    device_name: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
    is_active: bool,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            token_hash: TokenHash::from_hex(self.token_hash),
            refresh_hash: TokenHash::from_hex(self.refresh_hash),
            device_id: self.device_id,
            device_name: self.device_name,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
            is_active: self.is_active,
            last_activity_at: self.last_activity_at,
            expires_at: self.expires_at,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
            revoked_reason: self.revoked_reason,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SecurityEventRow {
    event_id: Uuid,
    user_id: Option<Uuid>,
    event_type: String,
    severity: String,
    description: String,
    ip_address: Option<String>,
    context: Json<SecurityEventContext>,
    resolved: bool,
    resolved_by: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SecurityEventRow {
    fn into_event(self) -> AuthResult<SecurityEvent> {
        Ok(SecurityEvent {
            event_id: SecurityEventId::from_uuid(self.event_id),
            user_id: self.user_id.map(UserId::from_uuid),
            event_type: self.event_type.parse().map_err(AuthError::Internal)?,
            severity: self.severity.parse().map_err(AuthError::Internal)?,
            description: self.description,
            ip_address: self.ip_address,
            context: self.context.0,
            resolved: self.resolved,
            resolved_by: self.resolved_by.map(UserId::from_uuid),
            resolved_at: self.resolved_at,
            created_at: self.created_at,
        })
    }
}
