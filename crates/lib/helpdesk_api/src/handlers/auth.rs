//! Authentication request handlers.

use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use helpdesk_core::auth::Registration;
use helpdesk_core::models::auth::Role;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{AuthenticatedUser, token_from_headers};
use crate::middleware::source::RequestSource;
use crate::models::{
    ChangePasswordRequest, IdentityResponse, LoginRequest, MeResponse, MessageResponse,
    RegisterRequest, TokenResponse,
};
use crate::services::cookies::{clear_token_cookie, token_cookie};

/// `POST /auth/login` — authenticate with email + password; sets the `token` cookie.
pub async fn login_handler(
    State(state): State<AppState>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let token = state
        .auth
        .authenticate(&body.email, &body.password, &source)
        .await?;
    let expires_in = state.auth.issuer().ttl().num_seconds();
    let jar = jar.add(token_cookie(&token, expires_in));
    Ok((jar, Json(TokenResponse { token, expires_in })))
}

/// `POST /auth/logout` — expire the cookie. The token itself stays valid
/// until its natural expiry.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(claims) =
        token_from_headers(&headers).and_then(|t| state.auth.issuer().verify(&t).ok())
    {
        state.auth.logout(&claims, &source).await;
    }
    (
        jar.add(clear_token_cookie()),
        Json(MessageResponse::new("Logged out")),
    )
}

/// `GET /auth/me` — the caller's identity as carried by the token.
pub async fn me_handler(
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse::from(claims))
}

/// `POST /auth/password` — change a password with proof of the current one.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&body.email, &body.current_password, &body.new_password, &source)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

/// `POST /auth/register` — self-service registration; always a client.
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<IdentityResponse>> {
    let registration = Registration {
        email: body.email,
        password: body.password,
        role: Role::Client,
        account_id: body.account_id,
        skills: Vec::new(),
    };
    let identity = state.auth.register(registration, None, &source).await?;
    Ok(Json(identity.into()))
}
