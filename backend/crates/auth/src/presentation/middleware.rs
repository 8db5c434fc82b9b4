//! Auth Middleware
//!
//! Bearer-token authentication for protected routes, and client details
//! (IP / User-Agent) for handlers that record them.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{ClientInfo, extract_bearer_token};

use crate::application::TokenService;
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Request origin, from `ConnectInfo` and forwarding headers
#[derive(Debug, Clone, Default)]
pub struct ClientContext(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(Self(ClientInfo::from_headers(&parts.headers, direct_ip)))
    }
}

/// Middleware that requires a valid bearer token bound to a live session.
///
/// On success the [`AuthContext`](crate::application::AuthContext) is
/// inserted into the request extensions.
pub async fn require_auth<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: AuthStore,
{
    let token = extract_bearer_token(req.headers())?.to_string();

    let tokens = TokenService::new(state.store.clone(), state.clock.clone(), state.config.clone());
    let ctx = tokens.authenticate(&token).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
