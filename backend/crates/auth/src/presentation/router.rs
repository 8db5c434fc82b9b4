//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::clock::{Clock, SystemClock};

use crate::application::config::AuthConfig;
use crate::domain::repository::AuthStore;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_auth;

/// Create the Auth router with PostgreSQL repository
pub fn auth_router(repo: PgAuthRepository, config: AuthConfig) -> Router {
    auth_router_generic(repo, config, Arc::new(SystemClock))
}

/// Create a generic Auth router for any store implementation
pub fn auth_router_generic<R>(store: R, config: AuthConfig, clock: Arc<dyn Clock>) -> Router
where
    R: AuthStore,
{
    let state = AuthAppState {
        store: Arc::new(store),
        config: Arc::new(config),
        clock,
    };

    let protected = Router::new()
        .route("/logout-all", post(handlers::logout_all::<R>))
        .route("/change-password", post(handlers::change_password::<R>))
        .route("/profile", get(handlers::profile::<R>))
        .route("/sessions", get(handlers::sessions::<R>))
        .route("/totp/setup", post(handlers::totp_setup::<R>))
        .route("/totp/verify", post(handlers::totp_verify::<R>))
        .route("/totp/disable", post(handlers::totp_disable::<R>))
        .route("/security-events", get(handlers::security_events::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<R>,
        ));

    Router::new()
        .route("/login", post(handlers::login::<R>))
        .route("/refresh", post(handlers::refresh::<R>))
        .route("/logout", post(handlers::logout::<R>))
        .merge(protected)
        .with_state(state)
}
