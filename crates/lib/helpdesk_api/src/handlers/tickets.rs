//! Ticket request handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use helpdesk_core::models::ticket::Ticket;
use helpdesk_core::tickets::{TicketChanges, TicketDraft};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::source::RequestSource;
use crate::models::{CreateTicketRequest, UpdateTicketRequest};

/// `GET /tickets` — tickets visible to the caller.
pub async fn list_tickets_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.tickets.list(&claims, &source).await?))
}

/// `POST /tickets` — file a ticket as the caller.
pub async fn create_ticket_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Json(body): Json<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    let draft = TicketDraft {
        title: body.title,
        description: body.description,
        priority: body.priority,
        skills_needed: body.skills_needed,
    };
    let ticket = state.tickets.create(&claims, draft, &source).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// `GET /tickets/{id}`
pub async fn view_ticket_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
) -> AppResult<Json<Ticket>> {
    Ok(Json(state.tickets.view(&claims, id, &source).await?))
}

/// `PATCH /tickets/{id}` — assigned technician or admin changes status,
/// priority or description.
pub async fn update_ticket_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Extension(RequestSource(source)): Extension<RequestSource>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTicketRequest>,
) -> AppResult<Json<Ticket>> {
    let changes = TicketChanges {
        description: body.description,
        priority: body.priority,
        status: body.status,
    };
    Ok(Json(
        state.tickets.update(&claims, id, changes, &source).await?,
    ))
}
