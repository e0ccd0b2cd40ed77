//! Ticket domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub client_id: i64,
    pub tech_id: Option<i64>,
    /// Required skills as stored: a JSON array of strings.
    pub skills_needed: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Fields required to file a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub client_id: i64,
    pub skills_needed: Option<String>,
}

/// Status assigned to freshly filed tickets.
pub const STATUS_OPEN: &str = "open";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
/// Entering this status stamps `closed_at`; leaving it clears the stamp.
pub const STATUS_CLOSED: &str = "closed";

pub const STATUSES: [&str; 3] = [STATUS_OPEN, STATUS_IN_PROGRESS, STATUS_CLOSED];
