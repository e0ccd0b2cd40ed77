//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helpdesk_core::auth::AuthError;
use helpdesk_core::store::StoreError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Locked(m) => (StatusCode::LOCKED, "account_locked", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(msg) => AppError::Validation(msg),
            StoreError::Sql(e) => {
                error!(error = %e, "database error");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::SessionExpired => {
                AppError::Unauthorized(e.to_string())
            }
            AuthError::Token(_) => AppError::Unauthorized(AuthError::SessionExpired.to_string()),
            AuthError::AccountLocked => AppError::Locked(e.to_string()),
            AuthError::Forbidden(_) | AuthError::UnauthorizedRole(_) => {
                AppError::Forbidden(e.to_string())
            }
            AuthError::WeakPassword => AppError::Validation(e.to_string()),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::UnknownIdentity(_) => AppError::NotFound(e.to_string()),
            AuthError::Store(e) => AppError::from(e),
            AuthError::Internal(msg) => {
                error!(cause = %msg, "internal auth failure");
                AppError::Internal(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: AuthError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::SessionExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::AccountLocked), StatusCode::LOCKED);
        assert_eq!(status(AuthError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::UnauthorizedRole("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::WeakPassword), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::UnknownIdentity("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AuthError::Internal("bcrypt".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_not_found_is_404() {
        let e = AuthError::Store(StoreError::NotFound("ticket #1".into()));
        assert_eq!(status(e), StatusCode::NOT_FOUND);
    }
}
