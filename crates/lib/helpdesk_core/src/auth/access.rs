//! Role-based access gate.
//!
//! Pure decisions over verified token claims. Callers reach this only after
//! the token has been verified; denials of admin-only actions are written to
//! the audit sink.

use std::fmt;

use tracing::warn;

use super::AuthError;
use crate::audit::{AuditEvent, AuditSink};
use crate::models::auth::{Role, TokenClaims};
use crate::models::ticket::Ticket;

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListTickets,
    ViewTicket,
    CreateTicket,
    UpdateTicket,
    AssignTechnician,
    MatchTechnicians,
    DeleteTicket,
    DeleteUser,
    RegisterUser,
    UnlockUser,
    ClearDatabase,
    ViewLogs,
    AdminResetPassword,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListTickets => "list_tickets",
            Action::ViewTicket => "view_ticket",
            Action::CreateTicket => "create_ticket",
            Action::UpdateTicket => "update_ticket",
            Action::AssignTechnician => "assign_technician",
            Action::MatchTechnicians => "match_technicians",
            Action::DeleteTicket => "delete_ticket",
            Action::DeleteUser => "delete_user",
            Action::RegisterUser => "register_user",
            Action::UnlockUser => "unlock_user",
            Action::ClearDatabase => "clear_database",
            Action::ViewLogs => "view_logs",
            Action::AdminResetPassword => "admin_reset_password",
        }
    }

    /// Whether only admins may perform this action.
    pub fn is_admin_only(&self) -> bool {
        !matches!(
            self,
            Action::ListTickets | Action::ViewTicket | Action::CreateTicket | Action::UpdateTicket
        )
    }

    fn allows(&self, role: &Role) -> bool {
        match (self, role) {
            (_, Role::Admin) => true,
            (Action::ListTickets | Action::ViewTicket, Role::Tech | Role::Client) => true,
            (Action::CreateTicket, Role::Client) => true,
            (Action::UpdateTicket, Role::Tech) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether `claims` may perform `action`.
///
/// Unknown roles are `UnauthorizedRole` for ticket access and `Forbidden`
/// for admin-only actions.
pub fn check(claims: &TokenClaims, action: Action) -> Result<(), AuthError> {
    if action.allows(&claims.role) {
        return Ok(());
    }
    if !claims.role.is_known() && !action.is_admin_only() {
        return Err(AuthError::UnauthorizedRole(claims.role.to_string()));
    }
    Err(AuthError::Forbidden(action.to_string()))
}

/// [`check`], recording every denial in the audit trail.
pub async fn authorize(
    claims: &TokenClaims,
    action: Action,
    audit: &dyn AuditSink,
    source: &str,
) -> Result<(), AuthError> {
    let result = check(claims, action);
    if result.is_err() {
        warn!(
            user_id = claims.user_id,
            role = %claims.role,
            action = action.as_str(),
            source,
            "authorization denied"
        );
        audit
            .record(
                AuditEvent::Forbidden {
                    actor_id: claims.user_id,
                    role: claims.role.clone(),
                    action: action.to_string(),
                },
                source,
            )
            .await;
    }
    result
}

/// Which tickets a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    /// Tickets filed by this client.
    Client(i64),
    /// Tickets assigned to this technician.
    Technician(i64),
}

impl TicketScope {
    pub fn for_claims(claims: &TokenClaims) -> Result<Self, AuthError> {
        match claims.role {
            Role::Admin => Ok(TicketScope::All),
            Role::Tech => Ok(TicketScope::Technician(claims.user_id)),
            Role::Client => Ok(TicketScope::Client(claims.user_id)),
            Role::Unknown(ref raw) => Err(AuthError::UnauthorizedRole(raw.clone())),
        }
    }

    pub fn permits(&self, ticket: &Ticket) -> bool {
        match self {
            TicketScope::All => true,
            TicketScope::Client(id) => ticket.client_id == *id,
            TicketScope::Technician(id) => ticket.tech_id == Some(*id),
        }
    }
}

/// Gate `action` on one ticket: the caller's [`TicketScope`] must cover it.
pub async fn authorize_ticket(
    claims: &TokenClaims,
    action: Action,
    ticket: &Ticket,
    audit: &dyn AuditSink,
    source: &str,
) -> Result<(), AuthError> {
    let scope = TicketScope::for_claims(claims)?;
    if scope.permits(ticket) {
        return Ok(());
    }
    warn!(
        user_id = claims.user_id,
        ticket_id = ticket.id,
        action = action.as_str(),
        source,
        "ticket access denied"
    );
    audit
        .record(
            AuditEvent::Forbidden {
                actor_id: claims.user_id,
                role: claims.role.clone(),
                action: format!("{action} #{}", ticket.id),
            },
            source,
        )
        .await;
    Err(AuthError::Forbidden(action.to_string()))
}
