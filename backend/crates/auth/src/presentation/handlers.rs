//! HTTP Handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use platform::client::extract_bearer_token;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::{
    AuthContext, ChangePasswordInput, ChangePasswordUseCase, ListSessionsUseCase, ProfileUseCase,
    SecurityEventRecorder, SignInInput, SignInUseCase, SignOutUseCase, TokenPair, TokenService,
    TotpSetupUseCase,
};
use crate::domain::entity::DeviceInfo;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::Permission;
use crate::error::AuthResult;
use crate::presentation::dto::{
    ChangePasswordRequest, LoginRequest, LoginResponse, ProfileResponse, RefreshRequest,
    RevokedSessionsResponse, SecurityEventQuery, SecurityEventsResponse, SessionsResponse,
    TotpCodeRequest, TotpSetupResponse,
};
use crate::presentation::middleware::ClientContext;

const DEFAULT_EVENT_LIMIT: u32 = 50;
const MAX_EVENT_LIMIT: u32 = 200;

/// Shared state for auth handlers
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub store: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<R> Clone for AuthAppState<R>
where
    R: AuthStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

// ============================================================================
// Login / Refresh / Logout
// ============================================================================

/// POST /api/auth/login
pub async fn login<R>(
    State(state): State<AuthAppState<R>>,
    ClientContext(client): ClientContext,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
{
    let use_case = SignInUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());

    let device_info = req.device_info.unwrap_or_default();
    let input = SignInInput {
        identifier: req.identifier,
        password: req.password,
        two_factor_code: req.two_factor_code,
        device: DeviceInfo {
            device_id: device_info.device_id,
            device_name: device_info.device_name,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_string(),
        },
    };

    let output = use_case.execute(input).await?;

    Ok(Json(LoginResponse {
        tokens: output.tokens,
        session: output.session.into(),
        user: output.profile.into(),
        roles: output.roles.into_iter().collect(),
        permissions: output.permissions.into_iter().collect(),
    }))
}

/// POST /api/auth/refresh
pub async fn refresh<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<TokenPair>>
where
    R: AuthStore,
{
    let tokens = TokenService::new(state.store.clone(), state.clock.clone(), state.config.clone());
    let pair = tokens.refresh_token(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /api/auth/logout
///
/// Always 204; a missing or stale token has nothing to revoke.
pub async fn logout<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    if let Ok(token) = extract_bearer_token(&headers) {
        let use_case =
            SignOutUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
        use_case.execute(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/logout-all
pub async fn logout_all<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<RevokedSessionsResponse>>
where
    R: AuthStore,
{
    let use_case = SignOutUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
    let revoked_sessions = use_case.execute_all(&ctx).await?;
    Ok(Json(RevokedSessionsResponse { revoked_sessions }))
}

// ============================================================================
// Account
// ============================================================================

/// POST /api/auth/change-password
pub async fn change_password<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    ClientContext(client): ClientContext,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<RevokedSessionsResponse>>
where
    R: AuthStore,
{
    let use_case =
        ChangePasswordUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
    let output = use_case
        .execute(
            &ctx,
            ChangePasswordInput {
                current_password: req.current_password,
                new_password: req.new_password,
                ip_address: client.ip_string(),
            },
        )
        .await?;

    Ok(Json(RevokedSessionsResponse {
        revoked_sessions: output.revoked_sessions,
    }))
}

/// GET /api/auth/profile
pub async fn profile<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<ProfileResponse>>
where
    R: AuthStore,
{
    let use_case = ProfileUseCase::new(state.store.clone());
    let profile = use_case.execute(&ctx.user_id).await?;
    Ok(Json(profile.into()))
}

/// GET /api/auth/sessions
pub async fn sessions<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<SessionsResponse>>
where
    R: AuthStore,
{
    let use_case = ListSessionsUseCase::new(state.store.clone(), state.clock.clone());
    let sessions = use_case.execute(&ctx).await?;
    Ok(Json(SessionsResponse {
        sessions: sessions.into_iter().map(Into::into).collect(),
    }))
}

// ============================================================================
// TOTP
// ============================================================================

/// POST /api/auth/totp/setup
pub async fn totp_setup<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<TotpSetupResponse>>
where
    R: AuthStore,
{
    let use_case = TotpSetupUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
    let output = use_case.setup(&ctx.user_id).await?;
    Ok(Json(output.into()))
}

/// POST /api/auth/totp/verify
pub async fn totp_verify<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<TotpCodeRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    let use_case = TotpSetupUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
    use_case.verify(&ctx.user_id, &req.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/totp/disable
pub async fn totp_disable<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    ClientContext(client): ClientContext,
    Json(req): Json<TotpCodeRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    let use_case = TotpSetupUseCase::new(state.store.clone(), state.clock.clone(), state.config.clone());
    use_case
        .disable(&ctx.user_id, &req.code, client.ip_string())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Security Events
// ============================================================================

/// GET /api/auth/security-events?limit=N
pub async fn security_events<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<SecurityEventQuery>,
) -> AuthResult<Json<SecurityEventsResponse>>
where
    R: AuthStore,
{
    ctx.require_permissions(&[Permission::from("security_events:read")], true)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    let recorder = SecurityEventRecorder::new(state.store.clone(), state.clock.clone());
    let events = recorder.recent_events(limit).await?;

    Ok(Json(SecurityEventsResponse {
        events: events.into_iter().map(Into::into).collect(),
    }))
}
