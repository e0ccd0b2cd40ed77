//! Authentication middleware — token extraction and JWT verification.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use helpdesk_core::auth::TokenError;
use helpdesk_core::models::auth::TokenClaims;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::TOKEN_COOKIE;

/// Key used to store `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

/// The `token` cookie, else an `Authorization: Bearer` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Axum middleware: verifies the caller's token and injects
/// `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = token_from_headers(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing session token".into()))?;

    let claims = state.auth.issuer().verify(&token).map_err(|e| {
        match e {
            TokenError::Expired => debug!("rejected expired token"),
            TokenError::InvalidSignature => debug!("rejected token with invalid signature"),
        }
        AppError::Unauthorized("Session expired".into())
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}
