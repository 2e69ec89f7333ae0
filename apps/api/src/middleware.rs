use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use ipnet::IpNet;
use retreat_access_core::{AppError, AuditContext, UserId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the caller identity set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());

    let context = audit_context_from_headers(request.headers(), peer, &state.trusted_proxies)?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

pub fn audit_context_from_headers(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Result<AuditContext, AppError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))
        .and_then(|value| {
            UserId::parse(value).map_err(|_| {
                AppError::Unauthorized(format!("invalid {USER_ID_HEADER} header"))
            })
        })?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    Ok(AuditContext::new(
        user_id,
        source_address(headers, peer, trusted_proxies).map(|address| address.to_string()),
        user_agent,
    ))
}

/// Resolves the client address. Forwarded headers are only honored when the
/// direct peer is a trusted proxy.
fn source_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted_proxies.iter().any(|network| network.contains(&peer)) {
        return Some(peer);
    }

    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or(Some(peer))
}
