//! Admin-only request handlers. Every call goes through the authorization
//! gate, so non-admins get `403` and an audit entry.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use helpdesk_core::audit::{AuditQuery, AuditRecord};
use helpdesk_core::auth::Registration;
use helpdesk_core::models::ticket::Ticket;
use helpdesk_core::tickets::{ClearSummary, TechnicianMatches};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::source::RequestSource;
use crate::models::{
    AdminResetPasswordRequest, AuditLogParams, ClearDatabaseRequest, IdentityResponse,
    MessageResponse, RegisterRequest, UnlockRequest, UnlockResponse,
};

/// `POST /admin/users` — create an account with any concrete role.
pub async fn register_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<IdentityResponse>)> {
    let role = body
        .role
        .ok_or_else(|| AppError::Validation("role is required".into()))?;
    let registration = Registration {
        email: body.email,
        password: body.password,
        role,
        account_id: body.account_id,
        skills: body.skills,
    };
    let identity = state
        .auth
        .register(registration, Some(&claims), &source)
        .await?;
    Ok((StatusCode::CREATED, Json(identity.into())))
}

/// `POST /admin/users/password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<AdminResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth
        .admin_reset_password(&claims, &body.email, &body.new_password, &source)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Password reset for {}",
        body.email.trim()
    ))))
}

/// `POST /admin/users/unlock`
pub async fn unlock_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<UnlockRequest>,
) -> AppResult<Json<UnlockResponse>> {
    let was_locked = state
        .auth
        .unlock_identity(&claims, &body.email, &source)
        .await?;
    Ok(Json(UnlockResponse {
        email: body.email.trim().to_string(),
        was_locked,
    }))
}

/// `DELETE /admin/users/{id}`
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
) -> AppResult<Json<IdentityResponse>> {
    let removed = state.auth.delete_user(&claims, id, &source).await?;
    Ok(Json(removed.into()))
}

/// `GET /admin/logs?search=&page=&limit=` — newest audit entries first.
pub async fn audit_log_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<Vec<AuditRecord>>> {
    let query = AuditQuery::new(params.search, params.page, params.limit);
    Ok(Json(
        state.audit_log.view_logs(&claims, &query, &source).await?,
    ))
}

/// `POST /admin/maintenance/clear` — remove all tickets and every other
/// account. Requires `{"confirm": true}`.
pub async fn clear_database_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<ClearDatabaseRequest>,
) -> AppResult<Json<ClearSummary>> {
    if !body.confirm {
        return Err(AppError::Validation(
            "Clearing the database requires \"confirm\": true".into(),
        ));
    }
    Ok(Json(
        state.tickets.clear_database(&claims, &source).await?,
    ))
}

/// `GET /admin/tickets/{id}/matches` — technicians ranked by skill overlap.
pub async fn match_technicians_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
) -> AppResult<Json<TechnicianMatches>> {
    Ok(Json(
        state.tickets.match_for_ticket(&claims, id, &source).await?,
    ))
}

/// `POST /admin/tickets/{id}/assign/{tech_id}`
pub async fn assign_technician_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path((id, tech_id)): Path<(i64, i64)>,
) -> AppResult<Json<Ticket>> {
    Ok(Json(
        state.tickets.assign(&claims, id, tech_id, &source).await?,
    ))
}

/// `POST /admin/tickets/{id}/unassign`
pub async fn unassign_technician_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
) -> AppResult<Json<Ticket>> {
    Ok(Json(state.tickets.unassign(&claims, id, &source).await?))
}

/// `DELETE /admin/tickets/{id}`
pub async fn delete_ticket_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.tickets.delete(&claims, id, &source).await?;
    Ok(Json(MessageResponse::new(format!("Ticket #{id} deleted"))))
}
