//! Client identification from HTTP headers
//!
//! Sessions record where a login came from (IP, User-Agent); protected
//! routes read the bearer credential from `Authorization`.

use std::net::IpAddr;

use axum::http::{HeaderMap, header};

/// Request origin details recorded on a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Self {
        Self {
            ip: extract_client_ip(headers, direct_ip),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    pub fn ip_string(&self) -> Option<String> {
        self.ip.map(|ip| ip.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BearerTokenError {
    #[error("Missing Authorization header")]
    Missing,
    #[error("Authorization header is not a Bearer credential")]
    Malformed,
}

/// Client IP: first entry of `X-Forwarded-For`, else the socket address.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or(direct_ip)
}

/// Token from `Authorization: Bearer <token>` (scheme is case-insensitive).
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, BearerTokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(BearerTokenError::Missing)?
        .to_str()
        .map_err(|_| BearerTokenError::Malformed)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(BearerTokenError::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(BearerTokenError::Malformed);
    }
    Ok(token)
}
