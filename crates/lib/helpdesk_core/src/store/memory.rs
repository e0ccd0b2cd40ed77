//! In-memory store backed by `DashMap`.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{IdentityStore, StoreError, TicketStore};
use crate::auth::access::TicketScope;
use crate::models::auth::{Identity, NewIdentity, Role};
use crate::models::ticket::{NewTicket, STATUS_OPEN, Ticket};

/// Identities and tickets held in process memory. Ids start at 1.
///
/// `emails` maps each registered email to its identity id. Lock order is
/// `emails` before `identities`.
#[derive(Debug)]
pub struct MemoryStore {
    identities: DashMap<i64, Identity>,
    emails: DashMap<String, i64>,
    tickets: DashMap<i64, Ticket>,
    next_identity_id: AtomicI64,
    next_ticket_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
            emails: DashMap::new(),
            tickets: DashMap::new(),
            next_identity_id: AtomicI64::new(1),
            next_ticket_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn email_taken(email: &str) -> StoreError {
    StoreError::Conflict(format!("email already registered: {email}"))
}

fn sorted_by_id<T>(mut rows: Vec<(i64, T)>) -> Vec<T> {
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.identities.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let previous = self
            .identities
            .get(&identity.id)
            .map(|entry| entry.email.clone());
        if previous.as_deref() != Some(identity.email.as_str()) {
            match self.emails.entry(identity.email.clone()) {
                Entry::Occupied(taken) if *taken.get() != identity.id => {
                    return Err(email_taken(&identity.email));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(identity.id);
                }
            }
            if let Some(old) = previous {
                self.emails.remove_if(&old, |_, id| *id == identity.id);
            }
        }
        self.identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        // The vacant entry holds the shard lock until the identity is in.
        let Entry::Vacant(slot) = self.emails.entry(new.email.clone()) else {
            return Err(email_taken(&new.email));
        };
        let identity = Identity {
            id: self.next_identity_id.fetch_add(1, Ordering::SeqCst),
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            failed_attempts: 0,
            locked: false,
            last_login: None,
            account_id: new.account_id,
            skills: new.skills,
        };
        self.identities.insert(identity.id, identity.clone());
        slot.insert(identity.id);
        Ok(identity)
    }

    async fn find_identities_by_role(&self, role: &Role) -> Result<Vec<Identity>, StoreError> {
        let rows = self
            .identities
            .iter()
            .filter(|entry| entry.role == *role)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        Ok(sorted_by_id(rows))
    }

    async fn delete_identity(&self, id: i64) -> Result<bool, StoreError> {
        if self.tickets.iter().any(|entry| entry.client_id == id) {
            return Err(StoreError::Conflict(format!(
                "identity {id} still owns tickets"
            )));
        }
        let Some((_, identity)) = self.identities.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove_if(&identity.email, |_, owner| *owner == id);
        let now = Utc::now();
        for mut ticket in self.tickets.iter_mut() {
            if ticket.tech_id == Some(id) {
                ticket.tech_id = None;
                ticket.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn delete_identities_except(&self, keep_id: i64) -> Result<u64, StoreError> {
        let doomed: Vec<i64> = self
            .identities
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| *id != keep_id)
            .collect();
        let mut removed = 0;
        for id in doomed {
            if let Some((_, identity)) = self.identities.remove(&id) {
                self.emails.remove_if(&identity.email, |_, owner| *owner == id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, StoreError> {
        let now = Utc::now();
        let ticket = Ticket {
            id: self.next_ticket_id.fetch_add(1, Ordering::SeqCst),
            title: new.title,
            description: new.description,
            priority: new.priority,
            status: STATUS_OPEN.to_string(),
            client_id: new.client_id,
            tech_id: None,
            skills_needed: new.skills_needed,
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_tickets(&self, scope: &TicketScope) -> Result<Vec<Ticket>, StoreError> {
        let rows = self
            .tickets
            .iter()
            .filter(|entry| scope.permits(entry.value()))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        Ok(sorted_by_id(rows))
    }

    async fn assign_technician(
        &self,
        ticket_id: i64,
        tech_id: Option<i64>,
    ) -> Result<Ticket, StoreError> {
        let mut entry = self
            .tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {ticket_id}")))?;
        entry.tech_id = tech_id;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        let mut entry = self
            .tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))?;
        entry.description = ticket.description.clone();
        entry.priority = ticket.priority.clone();
        entry.status = ticket.status.clone();
        entry.closed_at = ticket.closed_at;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn delete_ticket(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tickets.remove(&id).is_some())
    }

    async fn delete_all_tickets(&self) -> Result<u64, StoreError> {
        let removed = self.tickets.len() as u64;
        self.tickets.clear();
        Ok(removed)
    }
}
