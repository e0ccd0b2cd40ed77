//! Audit trail for security-relevant events.
//!
//! Sinks are fire-and-forget: a failed write is logged and dropped, never
//! returned to the caller. Reading the trail back goes through [`AuditLog`]
//! and, for callers holding a token, the admin-gated [`AuditViewer`].

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::AuthError;
use crate::auth::access::{self, Action};
use crate::models::auth::{Role, TokenClaims};
use crate::store::{StoreError, queries};

/// Source label used when no network address is available.
pub const LOCAL_SOURCE: &str = "cli-local";

/// A security-relevant event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    LoginSucceeded { email: String },
    LoginFailed { email: String },
    AccountLocked { email: String },
    LoginRejectedLocked { email: String },
    PasswordChanged { email: String },
    AdminPasswordReset { actor_id: i64, email: String },
    IdentityUnlocked { actor_id: i64, email: String },
    IdentityRegistered { actor_id: Option<i64>, email: String, role: Role },
    IdentityDeleted { actor_id: i64, email: String },
    DatabaseCleared { actor_id: i64, tickets: u64, identities: u64 },
    Forbidden { actor_id: i64, role: Role, action: String },
    Logout { user_id: i64 },
}

impl AuditEvent {
    /// Stable event name, used as the `event` column.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::LoginSucceeded { .. } => "login_succeeded",
            AuditEvent::LoginFailed { .. } => "login_failed",
            AuditEvent::AccountLocked { .. } => "account_locked",
            AuditEvent::LoginRejectedLocked { .. } => "login_rejected_locked",
            AuditEvent::PasswordChanged { .. } => "password_changed",
            AuditEvent::AdminPasswordReset { .. } => "admin_password_reset",
            AuditEvent::IdentityUnlocked { .. } => "identity_unlocked",
            AuditEvent::IdentityRegistered { .. } => "identity_registered",
            AuditEvent::IdentityDeleted { .. } => "identity_deleted",
            AuditEvent::DatabaseCleared { .. } => "database_cleared",
            AuditEvent::Forbidden { .. } => "forbidden",
            AuditEvent::Logout { .. } => "logout",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::LoginSucceeded { email } => write!(f, "successful login: {email}"),
            AuditEvent::LoginFailed { email } => write!(f, "failed login: {email}"),
            AuditEvent::AccountLocked { email } => {
                write!(f, "account locked after repeated failures: {email}")
            }
            AuditEvent::LoginRejectedLocked { email } => {
                write!(f, "login attempt on locked account: {email}")
            }
            AuditEvent::PasswordChanged { email } => write!(f, "password changed: {email}"),
            AuditEvent::AdminPasswordReset { actor_id, email } => {
                write!(f, "admin {actor_id} reset password for {email}")
            }
            AuditEvent::IdentityUnlocked { actor_id, email } => {
                write!(f, "admin {actor_id} unlocked {email}")
            }
            AuditEvent::IdentityRegistered {
                actor_id: Some(actor),
                email,
                role,
            } => write!(f, "admin {actor} registered {email} ({role})"),
            AuditEvent::IdentityRegistered {
                actor_id: None,
                email,
                role,
            } => write!(f, "self-registered {email} ({role})"),
            AuditEvent::IdentityDeleted { actor_id, email } => {
                write!(f, "admin {actor_id} deleted {email}")
            }
            AuditEvent::DatabaseCleared {
                actor_id,
                tickets,
                identities,
            } => write!(
                f,
                "admin {actor_id} cleared the database ({tickets} tickets, {identities} identities)"
            ),
            AuditEvent::Forbidden {
                actor_id,
                role,
                action,
            } => write!(f, "user {actor_id} (role: {role}) denied {action}"),
            AuditEvent::Logout { user_id } => write!(f, "user {user_id} logged out"),
        }
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent, source: &str);
}

/// One stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: i64,
    pub event: String,
    pub detail: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    fn matches(&self, needle: &str) -> bool {
        [&self.event, &self.detail, &self.source]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

pub const DEFAULT_AUDIT_PAGE_SIZE: u32 = 50;
pub const MAX_AUDIT_PAGE_SIZE: u32 = 500;

/// A page request over the audit trail, newest entries first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Case-insensitive substring of the event name, detail or source.
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl AuditQuery {
    /// Normalize raw paging input: blank search is no search, page starts at
    /// 1 and the page size is clamped to `1..=MAX_AUDIT_PAGE_SIZE`.
    pub fn new(search: Option<String>, page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_AUDIT_PAGE_SIZE)
                .clamp(1, MAX_AUDIT_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// Read side of the audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, StoreError>;
}

/// Admin-gated reads of the audit trail.
pub struct AuditViewer {
    log: Arc<dyn AuditLog>,
    audit: Arc<dyn AuditSink>,
}

impl AuditViewer {
    pub fn new(log: Arc<dyn AuditLog>, audit: Arc<dyn AuditSink>) -> Self {
        Self { log, audit }
    }

    pub async fn view_logs(
        &self,
        claims: &TokenClaims,
        query: &AuditQuery,
        source: &str,
    ) -> Result<Vec<AuditRecord>, AuthError> {
        access::authorize(claims, Action::ViewLogs, self.audit.as_ref(), source).await?;
        Ok(self.log.recent(query).await?)
    }
}

/// Writes audit events as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent, source: &str) {
        info!(target: "audit", event = event.kind(), source, "{event}");
    }
}

/// Persists audit events to the `audit_log` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent, source: &str) {
        info!(target: "audit", event = event.kind(), source, "{event}");
        if let Err(e) =
            queries::insert_audit_log(&self.pool, event.kind(), &event.to_string(), source).await
        {
            warn!("PgAuditSink: failed to record audit log: {e}");
        }
    }
}

#[async_trait]
impl AuditLog for PgAuditSink {
    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, StoreError> {
        queries::list_audit_log(
            &self.pool,
            query.search.as_deref(),
            i64::from(query.limit),
            i64::try_from(query.offset()).unwrap_or(i64::MAX),
        )
        .await
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<(AuditEvent, String, DateTime<Utc>)>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(event, source)` pairs in recording order.
    pub fn events(&self) -> Vec<(AuditEvent, String)> {
        self.with_events(|events| {
            events
                .iter()
                .map(|(event, source, _)| (event.clone(), source.clone()))
                .collect()
        })
    }

    fn with_events<R>(
        &self,
        f: impl FnOnce(&mut Vec<(AuditEvent, String, DateTime<Utc>)>) -> R,
    ) -> R {
        match self.events.lock() {
            Ok(mut events) => f(&mut events),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent, source: &str) {
        self.with_events(|events| events.push((event, source.to_string(), Utc::now())));
    }
}

#[async_trait]
impl AuditLog for RecordingAuditSink {
    async fn recent(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, StoreError> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        Ok(self.with_events(|events| {
            events
                .iter()
                .enumerate()
                .rev()
                .map(|(index, (event, source, at))| AuditRecord {
                    id: index as i64 + 1,
                    event: event.kind().to_string(),
                    detail: event.to_string(),
                    source: source.clone(),
                    created_at: *at,
                })
                .filter(|record| needle.as_deref().is_none_or(|n| record.matches(n)))
                .skip(offset)
                .take(query.limit as usize)
                .collect()
        }))
    }
}
