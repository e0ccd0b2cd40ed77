//! Persistence collaborators for identities and tickets.
//!
//! The auth core only depends on the traits here. [`MemoryStore`] backs tests
//! and embedded use; [`PgStore`] is the PostgreSQL implementation used by the
//! server and the CLI.

pub mod memory;
pub mod postgres;
pub mod queries;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::access::TicketScope;
use crate::models::auth::{Identity, NewIdentity, Role};
use crate::models::ticket::{NewTicket, Ticket};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Identity persistence.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError>;

    /// Insert or overwrite the full identity row.
    async fn save_identity(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Create an identity. Fails with `Conflict` when the email is taken.
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    /// All identities with `role`, ordered by id.
    async fn find_identities_by_role(&self, role: &Role) -> Result<Vec<Identity>, StoreError>;

    /// Delete an identity, unassigning it from any tickets it was working.
    /// Returns whether it existed. Fails with `Conflict` while the identity
    /// still owns tickets as a client.
    async fn delete_identity(&self, id: i64) -> Result<bool, StoreError>;

    /// Delete every identity except `keep_id`. Returns how many were removed.
    /// Tickets must already be gone.
    async fn delete_identities_except(&self, keep_id: i64) -> Result<u64, StoreError>;
}

/// Ticket persistence.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, StoreError>;

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError>;

    /// Tickets visible under `scope`, ordered by id.
    async fn list_tickets(&self, scope: &TicketScope) -> Result<Vec<Ticket>, StoreError>;

    /// Set or clear the assigned technician. Fails with `NotFound` for an
    /// unknown ticket.
    async fn assign_technician(
        &self,
        ticket_id: i64,
        tech_id: Option<i64>,
    ) -> Result<Ticket, StoreError>;

    /// Persist `description`, `priority`, `status` and `closed_at` from
    /// `ticket` and bump `updated_at`. Fails with `NotFound` for an unknown
    /// ticket.
    async fn update_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError>;

    /// Returns whether a ticket was deleted.
    async fn delete_ticket(&self, id: i64) -> Result<bool, StoreError>;

    /// Delete every ticket. Returns how many were removed.
    async fn delete_all_tickets(&self) -> Result<u64, StoreError>;
}
