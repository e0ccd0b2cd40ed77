//! Source address used for the audit trail.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// Where a request came from, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSource(pub String);

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The peer address, else `unknown`. With `trust_forwarded_for` the first
/// `X-Forwarded-For` hop takes precedence; otherwise the header is ignored,
/// since any client can set it.
pub fn source_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Axum middleware: injects [`RequestSource`] into request extensions.
pub async fn capture_source(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let source = source_address(request.headers(), peer, state.config.trust_forwarded_for);
    request.extensions_mut().insert(RequestSource(source));
    next.run(request).await
}
