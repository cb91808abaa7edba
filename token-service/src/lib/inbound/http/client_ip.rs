use std::net::IpAddr;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::handlers::ApiError;
use crate::domain::credentials::models::ClientIp;

/// Network origin of the caller.
///
/// Resolved from the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the TCP peer address. Header values that do not parse as an IP address
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub ClientIp);

#[async_trait]
impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = header_ip(&parts.headers)
            .or(peer)
            .ok_or_else(|| ApiError::BadRequest("Unable to determine client IP".to_string()))?;

        ClientIp::new(ip.to_string())
            .map(ClientAddress)
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

fn header_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
