//! PostgreSQL-backed store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{IdentityStore, StoreError, TicketStore, queries};
use crate::auth::access::TicketScope;
use crate::models::auth::{Identity, NewIdentity, Role};
use crate::models::ticket::{NewTicket, Ticket};

/// Identity and ticket store over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        queries::find_identity_by_email(&self.pool, email).await
    }

    async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        queries::find_identity_by_id(&self.pool, id).await
    }

    async fn save_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        queries::save_identity(&self.pool, identity).await
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        queries::create_identity(&self.pool, &new).await
    }

    async fn find_identities_by_role(&self, role: &Role) -> Result<Vec<Identity>, StoreError> {
        queries::find_identities_by_role(&self.pool, role).await
    }

    async fn delete_identity(&self, id: i64) -> Result<bool, StoreError> {
        queries::delete_identity(&self.pool, id).await
    }

    async fn delete_identities_except(&self, keep_id: i64) -> Result<u64, StoreError> {
        queries::delete_identities_except(&self.pool, keep_id).await
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, StoreError> {
        queries::create_ticket(&self.pool, &new).await
    }

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        queries::find_ticket(&self.pool, id).await
    }

    async fn list_tickets(&self, scope: &TicketScope) -> Result<Vec<Ticket>, StoreError> {
        match scope {
            TicketScope::All => queries::list_all_tickets(&self.pool).await,
            TicketScope::Client(id) => queries::list_client_tickets(&self.pool, *id).await,
            TicketScope::Technician(id) => queries::list_technician_tickets(&self.pool, *id).await,
        }
    }

    async fn assign_technician(
        &self,
        ticket_id: i64,
        tech_id: Option<i64>,
    ) -> Result<Ticket, StoreError> {
        queries::assign_technician(&self.pool, ticket_id, tech_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {ticket_id}")))
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        queries::update_ticket(&self.pool, ticket)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))
    }

    async fn delete_ticket(&self, id: i64) -> Result<bool, StoreError> {
        queries::delete_ticket(&self.pool, id).await
    }

    async fn delete_all_tickets(&self) -> Result<u64, StoreError> {
        queries::delete_all_tickets(&self.pool).await
    }
}
