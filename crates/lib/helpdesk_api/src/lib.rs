//! # helpdesk_api
//!
//! HTTP API library for the helpdesk.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use helpdesk_core::audit::{AuditLog, AuditSink, AuditViewer};
use helpdesk_core::auth::Authenticator;
use helpdesk_core::store::{IdentityStore, TicketStore};
use helpdesk_core::tickets::TicketService;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, tickets};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub tickets: Arc<TicketService>,
    pub audit_log: Arc<AuditViewer>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the services over one identity store, one ticket store and an
    /// audit trail that is both written and read.
    pub fn new<A>(
        identities: Arc<dyn IdentityStore>,
        ticket_store: Arc<dyn TicketStore>,
        audit: Arc<A>,
        config: ApiConfig,
    ) -> Self
    where
        A: AuditSink + AuditLog + 'static,
    {
        let sink: Arc<dyn AuditSink> = audit.clone();
        let auth = Authenticator::from_config(identities.clone(), sink.clone(), &config.security);
        let tickets = TicketService::new(ticket_store, identities, sink.clone());
        Self {
            auth: Arc::new(auth),
            tickets: Arc::new(tickets),
            audit_log: Arc::new(AuditViewer::new(audit, sink)),
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `helpdesk_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    helpdesk_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/password", post(auth::change_password_handler))
        .route("/auth/register", post(auth::register_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/tickets",
            get(tickets::list_tickets_handler).post(tickets::create_ticket_handler),
        )
        .route(
            "/tickets/{id}",
            get(tickets::view_ticket_handler).patch(tickets::update_ticket_handler),
        )
        .route("/admin/users", post(admin::register_user_handler))
        .route("/admin/users/{id}", delete(admin::delete_user_handler))
        .route("/admin/users/password", post(admin::reset_password_handler))
        .route("/admin/users/unlock", post(admin::unlock_user_handler))
        .route("/admin/tickets/{id}", delete(admin::delete_ticket_handler))
        .route(
            "/admin/tickets/{id}/matches",
            get(admin::match_technicians_handler),
        )
        .route(
            "/admin/tickets/{id}/assign/{tech_id}",
            post(admin::assign_technician_handler),
        )
        .route(
            "/admin/tickets/{id}/unassign",
            post(admin::unassign_technician_handler),
        )
        .route("/admin/logs", get(admin::audit_log_handler))
        .route("/admin/maintenance/clear", post(admin::clear_database_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::source::capture_source,
        ))
        .layer(cors)
        .with_state(state)
}
