//! Ticket workflows behind the authorization gate.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::auth::access::{self, Action, TicketScope};
use crate::auth::AuthError;
use crate::models::auth::{Role, TokenClaims};
use crate::models::ticket::{NewTicket, STATUS_CLOSED, STATUSES, Ticket};
use crate::skills::{ScoredTechnician, encode_skills, parse_skills, rank_technicians};
use crate::store::{IdentityStore, StoreError, TicketStore};

/// Accepted ticket priorities.
pub const PRIORITIES: [&str; 4] = ["low", "medium", "high", "critical"];
pub const DEFAULT_PRIORITY: &str = "medium";

/// Caller-supplied fields for a new ticket.
#[derive(Debug, Clone, Default)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    /// `None` files the ticket at [`DEFAULT_PRIORITY`].
    pub priority: Option<String>,
    pub skills_needed: Vec<String>,
}

/// Fields a technician or admin may change on an existing ticket. `None`
/// leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct TicketChanges {
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// What a database clear removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub tickets: u64,
    pub identities: u64,
}

/// Ranked technicians for a skill set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianMatches {
    pub ticket_id: Option<i64>,
    pub needed: Vec<String>,
    pub candidates: Vec<ScoredTechnician>,
}

pub struct TicketService {
    tickets: Arc<dyn TicketStore>,
    identities: Arc<dyn IdentityStore>,
    audit: Arc<dyn AuditSink>,
}

impl TicketService {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        identities: Arc<dyn IdentityStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            tickets,
            identities,
            audit,
        }
    }

    /// Tickets visible to the caller.
    pub async fn list(&self, claims: &TokenClaims, source: &str) -> Result<Vec<Ticket>, AuthError> {
        let scope = TicketScope::for_claims(claims)?;
        access::authorize(claims, Action::ListTickets, self.audit.as_ref(), source).await?;
        Ok(self.tickets.list_tickets(&scope).await?)
    }

    /// One ticket, if the caller owns it, is assigned to it, or is an admin.
    pub async fn view(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        source: &str,
    ) -> Result<Ticket, AuthError> {
        TicketScope::for_claims(claims)?;
        access::authorize(claims, Action::ViewTicket, self.audit.as_ref(), source).await?;
        let ticket = self.load(ticket_id).await?;
        access::authorize_ticket(claims, Action::ViewTicket, &ticket, self.audit.as_ref(), source)
            .await?;
        Ok(ticket)
    }

    /// File a ticket on behalf of the caller.
    pub async fn create(
        &self,
        claims: &TokenClaims,
        draft: TicketDraft,
        source: &str,
    ) -> Result<Ticket, AuthError> {
        access::authorize(claims, Action::CreateTicket, self.audit.as_ref(), source).await?;

        let title = draft.title.trim();
        if title.is_empty() {
            return Err(AuthError::Validation("Title is required".into()));
        }
        let priority = match draft.priority.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PRIORITY.to_string(),
            Some(p) => normalize_priority(p)?,
        };
        let skills: Vec<String> = draft
            .skills_needed
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let ticket = self
            .tickets
            .create_ticket(NewTicket {
                title: title.to_string(),
                description: draft.description.trim().to_string(),
                priority,
                client_id: claims.user_id,
                skills_needed: (!skills.is_empty()).then(|| encode_skills(&skills)),
            })
            .await?;

        info!(ticket_id = ticket.id, client_id = claims.user_id, "ticket created");
        Ok(ticket)
    }

    /// Change a ticket's description, priority or status.
    ///
    /// Technicians may only touch tickets assigned to them. Moving to
    /// `closed` stamps `closed_at`; any other status clears it.
    pub async fn update(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        changes: TicketChanges,
        source: &str,
    ) -> Result<Ticket, AuthError> {
        access::authorize(claims, Action::UpdateTicket, self.audit.as_ref(), source).await?;
        let mut ticket = self.load(ticket_id).await?;
        access::authorize_ticket(claims, Action::UpdateTicket, &ticket, self.audit.as_ref(), source)
            .await?;

        if changes.description.is_none() && changes.priority.is_none() && changes.status.is_none() {
            return Err(AuthError::Validation("Nothing to update".into()));
        }
        if let Some(description) = changes.description {
            ticket.description = description.trim().to_string();
        }
        if let Some(priority) = changes.priority {
            ticket.priority = normalize_priority(&priority)?;
        }
        if let Some(status) = changes.status {
            let status = status.trim().to_lowercase();
            if !STATUSES.contains(&status.as_str()) {
                return Err(AuthError::Validation(format!("Unknown status: {status}")));
            }
            ticket.closed_at = if status == STATUS_CLOSED {
                ticket.closed_at.or_else(|| Some(Utc::now()))
            } else {
                None
            };
            ticket.status = status;
        }

        let ticket = self.tickets.update_ticket(&ticket).await?;
        info!(
            ticket_id,
            user_id = claims.user_id,
            status = %ticket.status,
            priority = %ticket.priority,
            "ticket updated"
        );
        Ok(ticket)
    }

    /// Rank technicians against a ticket's required skills.
    pub async fn match_for_ticket(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        source: &str,
    ) -> Result<TechnicianMatches, AuthError> {
        access::authorize(claims, Action::MatchTechnicians, self.audit.as_ref(), source).await?;
        let ticket = self.load(ticket_id).await?;

        let needed = match ticket.skills_needed.as_deref() {
            None => Vec::new(),
            Some(raw) => parse_skills(raw).map_err(|e| {
                debug!(ticket_id, error = %e, "unparseable required skills");
                AuthError::Validation(format!("Ticket #{ticket_id} has malformed required skills"))
            })?,
        };

        let mut matches = self.rank(needed).await?;
        matches.ticket_id = Some(ticket_id);
        Ok(matches)
    }

    /// Rank technicians against an ad-hoc skill list.
    pub async fn match_skills(
        &self,
        claims: &TokenClaims,
        needed: Vec<String>,
        source: &str,
    ) -> Result<TechnicianMatches, AuthError> {
        access::authorize(claims, Action::MatchTechnicians, self.audit.as_ref(), source).await?;
        self.rank(needed).await
    }

    /// Assign a technician. The target must exist and have the `tech` role.
    pub async fn assign(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        tech_id: i64,
        source: &str,
    ) -> Result<Ticket, AuthError> {
        access::authorize(claims, Action::AssignTechnician, self.audit.as_ref(), source).await?;

        let tech = self
            .identities
            .find_identity_by_id(tech_id)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(format!("#{tech_id}")))?;
        if tech.role != Role::Tech {
            return Err(AuthError::Validation(format!(
                "{} is not a technician",
                tech.email
            )));
        }

        let ticket = self.tickets.assign_technician(ticket_id, Some(tech_id)).await?;
        info!(ticket_id, tech_id, admin_id = claims.user_id, "technician assigned");
        Ok(ticket)
    }

    pub async fn unassign(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        source: &str,
    ) -> Result<Ticket, AuthError> {
        access::authorize(claims, Action::AssignTechnician, self.audit.as_ref(), source).await?;
        let ticket = self.tickets.assign_technician(ticket_id, None).await?;
        info!(ticket_id, admin_id = claims.user_id, "technician unassigned");
        Ok(ticket)
    }

    pub async fn delete(
        &self,
        claims: &TokenClaims,
        ticket_id: i64,
        source: &str,
    ) -> Result<(), AuthError> {
        access::authorize(claims, Action::DeleteTicket, self.audit.as_ref(), source).await?;
        if !self.tickets.delete_ticket(ticket_id).await? {
            return Err(not_found(ticket_id));
        }
        info!(ticket_id, admin_id = claims.user_id, "ticket deleted");
        Ok(())
    }

    /// Delete every ticket and every identity except the caller's.
    pub async fn clear_database(
        &self,
        claims: &TokenClaims,
        source: &str,
    ) -> Result<ClearSummary, AuthError> {
        access::authorize(claims, Action::ClearDatabase, self.audit.as_ref(), source).await?;
        let tickets = self.tickets.delete_all_tickets().await?;
        let identities = self.identities.delete_identities_except(claims.user_id).await?;

        warn!(
            admin_id = claims.user_id,
            tickets, identities, source, "database cleared"
        );
        self.audit
            .record(
                AuditEvent::DatabaseCleared {
                    actor_id: claims.user_id,
                    tickets,
                    identities,
                },
                source,
            )
            .await;
        Ok(ClearSummary {
            tickets,
            identities,
        })
    }

    async fn load(&self, ticket_id: i64) -> Result<Ticket, AuthError> {
        self.tickets
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(|| not_found(ticket_id))
    }

    async fn rank(&self, needed: Vec<String>) -> Result<TechnicianMatches, AuthError> {
        let techs = self.identities.find_identities_by_role(&Role::Tech).await?;
        let candidates = rank_technicians(&techs, &needed);
        debug!(
            considered = techs.len(),
            matched = candidates.len(),
            "ranked technicians"
        );
        Ok(TechnicianMatches {
            ticket_id: None,
            needed,
            candidates,
        })
    }
}

fn normalize_priority(raw: &str) -> Result<String, AuthError> {
    let priority = raw.trim().to_lowercase();
    if PRIORITIES.contains(&priority.as_str()) {
        Ok(priority)
    } else {
        Err(AuthError::Validation(format!("Unknown priority: {priority}")))
    }
}

fn not_found(ticket_id: i64) -> AuthError {
    AuthError::Store(StoreError::NotFound(format!("ticket #{ticket_id}")))
}
