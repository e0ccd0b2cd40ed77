//! Helpdesk domain models.
//!
//! These are internal domain models shared by the CLI and the HTTP layer.
//! Request/response payloads live in `helpdesk_api::models`.

pub mod auth;
pub mod ticket;

pub use auth::{Identity, NewIdentity, Role, TokenClaims};
pub use ticket::{NewTicket, Ticket};
