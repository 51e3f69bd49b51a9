use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use handoff_core::ClientContext;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract the client IP address
///
/// X-Forwarded-For (rightmost entry) and X-Real-IP are only honored when the
/// direct peer is one of `trusted_proxies`.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<String> {
    let direct = direct_ip?;

    if trusted_proxies.contains(&direct) {
        let forwarded = header_str(headers, "X-Forwarded-For")
            .and_then(|value| value.split(',').next_back())
            .or_else(|| header_str(headers, "X-Real-IP"))
            .map(str::trim)
            .filter(|ip| ip.parse::<IpAddr>().is_ok());

        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }

    Some(direct.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Client metadata recorded in the auth log
#[derive(Debug, Clone, Default)]
pub struct RequestContext(pub ClientContext);

fn direct_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> Self {
        RequestContext(ClientContext {
            ip: extract_client_ip(&parts.headers, direct_ip(parts), trusted_proxies),
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str())
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(
            parts,
            &state.config.trusted_proxies,
        ))
    }
}

/// Public origin of the request, `scheme://host`
///
/// Provider redirect URIs and completion links are built from it.
/// X-Forwarded-Proto and X-Forwarded-Host are only honored when the direct
/// peer is one of `trusted_proxies`.
#[derive(Debug, Clone)]
pub struct RequestDomain(pub String);

impl RequestDomain {
    pub fn from_parts(
        parts: &Parts,
        default_scheme: &str,
        trusted_proxies: &[IpAddr],
    ) -> Option<Self> {
        let forwarded = direct_ip(parts)
            .is_some_and(|ip| trusted_proxies.contains(&ip))
            .then_some(&parts.headers);

        let scheme = forwarded
            .and_then(|headers| header_str(headers, "X-Forwarded-Proto"))
            .map(|value| value.split(',').next().unwrap_or(value).trim())
            .filter(|scheme| *scheme == "http" || *scheme == "https")
            .unwrap_or(default_scheme);

        let host = forwarded
            .and_then(|headers| header_str(headers, "X-Forwarded-Host"))
            .or_else(|| header_str(&parts.headers, header::HOST.as_str()))
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
            .map(str::trim)
            .filter(|host| !host.is_empty())?;

        Some(RequestDomain(format!("{}://{}", scheme, host)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestDomain {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        RequestDomain::from_parts(
            parts,
            &state.config.public_scheme,
            &state.config.trusted_proxies,
        )
        .ok_or_else(|| ApiError::InvalidRequest("missing Host header".to_string()))
    }
}
