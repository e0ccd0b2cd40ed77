//! SQL queries for identities, tickets and the audit log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::StoreError;
use crate::audit::AuditRecord;
use crate::models::auth::{Identity, NewIdentity, Role};
use crate::models::ticket::{NewTicket, STATUS_OPEN, Ticket};

const IDENTITY_COLUMNS: &str = "id, email, password_hash, role, failed_attempts, locked, \
     last_login, account_id, skills";

const TICKET_COLUMNS: &str = "id, title, description, priority, status, client_id, tech_id, \
     skills_needed, created_at, updated_at, closed_at";

type IdentityRow = (
    i64,
    String,
    String,
    String,
    i32,
    bool,
    Option<DateTime<Utc>>,
    Option<i64>,
    Option<String>,
);

type TicketRow = (
    i64,
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn identity_from_row(row: IdentityRow) -> Identity {
    let (id, email, password_hash, role, failed_attempts, locked, last_login, account_id, skills) =
        row;
    Identity {
        id,
        email,
        password_hash,
        role: Role::parse(&role),
        failed_attempts,
        locked,
        last_login,
        account_id,
        skills,
    }
}

fn ticket_from_row(row: TicketRow) -> Ticket {
    let (
        id,
        title,
        description,
        priority,
        status,
        client_id,
        tech_id,
        skills_needed,
        created_at,
        updated_at,
        closed_at,
    ) = row;
    Ticket {
        id,
        title,
        description,
        priority,
        status,
        client_id,
        tech_id,
        skills_needed,
        created_at,
        updated_at,
        closed_at,
    }
}

/// Fetch an identity by exact email.
pub async fn find_identity_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Identity>, StoreError> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
    let row = sqlx::query_as::<_, IdentityRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(identity_from_row))
}

/// Fetch an identity by id.
pub async fn find_identity_by_id(pool: &PgPool, id: i64) -> Result<Option<Identity>, StoreError> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
    let row = sqlx::query_as::<_, IdentityRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(identity_from_row))
}

/// Upsert the full identity row.
pub async fn save_identity(pool: &PgPool, identity: &Identity) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO identities \
           (id, email, password_hash, role, failed_attempts, locked, last_login, account_id, skills) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (id) DO UPDATE SET \
           email = EXCLUDED.email, \
           password_hash = EXCLUDED.password_hash, \
           role = EXCLUDED.role, \
           failed_attempts = EXCLUDED.failed_attempts, \
           locked = EXCLUDED.locked, \
           last_login = EXCLUDED.last_login, \
           account_id = EXCLUDED.account_id, \
           skills = EXCLUDED.skills",
    )
    .bind(identity.id)
    .bind(&identity.email)
    .bind(&identity.password_hash)
    .bind(identity.role.as_str())
    .bind(identity.failed_attempts)
    .bind(identity.locked)
    .bind(identity.last_login)
    .bind(identity.account_id)
    .bind(identity.skills.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

/// Create an identity, returning the stored row.
pub async fn create_identity(pool: &PgPool, new: &NewIdentity) -> Result<Identity, StoreError> {
    let sql = format!(
        "INSERT INTO identities (email, password_hash, role, account_id, skills) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {IDENTITY_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IdentityRow>(&sql)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.account_id)
        .bind(new.skills.as_deref())
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(format!("email already registered: {}", new.email))
            }
            other => StoreError::Sql(other),
        })?;
    Ok(identity_from_row(row))
}

/// Fetch identities with a given role, ordered by id.
pub async fn find_identities_by_role(
    pool: &PgPool,
    role: &Role,
) -> Result<Vec<Identity>, StoreError> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE role = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, IdentityRow>(&sql)
        .bind(role.as_str())
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(identity_from_row).collect())
}

/// Delete an identity after unassigning it from tickets, in one transaction.
pub async fn delete_identity(pool: &PgPool, id: i64) -> Result<bool, StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE tickets SET tech_id = NULL, updated_at = now() WHERE tech_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM identities WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StoreError::Conflict(format!("identity {id} still owns tickets"))
            }
            other => StoreError::Sql(other),
        })?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every identity but one.
pub async fn delete_identities_except(pool: &PgPool, keep_id: i64) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM identities WHERE id <> $1")
        .bind(keep_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// File a new ticket.
pub async fn create_ticket(pool: &PgPool, new: &NewTicket) -> Result<Ticket, StoreError> {
    let sql = format!(
        "INSERT INTO tickets (title, description, priority, status, client_id, skills_needed) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TICKET_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.priority)
        .bind(STATUS_OPEN)
        .bind(new.client_id)
        .bind(new.skills_needed.as_deref())
        .fetch_one(pool)
        .await?;
    Ok(ticket_from_row(row))
}

/// Fetch a ticket by id.
pub async fn find_ticket(pool: &PgPool, id: i64) -> Result<Option<Ticket>, StoreError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(ticket_from_row))
}

/// List all tickets, ordered by id.
pub async fn list_all_tickets(pool: &PgPool) -> Result<Vec<Ticket>, StoreError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets ORDER BY id");
    let rows = sqlx::query_as::<_, TicketRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(ticket_from_row).collect())
}

/// List tickets filed by a client, ordered by id.
pub async fn list_client_tickets(pool: &PgPool, client_id: i64) -> Result<Vec<Ticket>, StoreError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE client_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(client_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(ticket_from_row).collect())
}

/// List tickets assigned to a technician, ordered by id.
pub async fn list_technician_tickets(
    pool: &PgPool,
    tech_id: i64,
) -> Result<Vec<Ticket>, StoreError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE tech_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(tech_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(ticket_from_row).collect())
}

/// Set or clear a ticket's technician.
pub async fn assign_technician(
    pool: &PgPool,
    ticket_id: i64,
    tech_id: Option<i64>,
) -> Result<Option<Ticket>, StoreError> {
    let sql = format!(
        "UPDATE tickets SET tech_id = $2, updated_at = now() WHERE id = $1 \
         RETURNING {TICKET_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(ticket_id)
        .bind(tech_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(ticket_from_row))
}

/// Write a ticket's mutable fields.
pub async fn update_ticket(pool: &PgPool, ticket: &Ticket) -> Result<Option<Ticket>, StoreError> {
    let sql = format!(
        "UPDATE tickets SET description = $2, priority = $3, status = $4, closed_at = $5, \
         updated_at = now() WHERE id = $1 RETURNING {TICKET_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(ticket.id)
        .bind(&ticket.description)
        .bind(&ticket.priority)
        .bind(&ticket.status)
        .bind(ticket.closed_at)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(ticket_from_row))
}

/// Delete a ticket, returning whether a row was removed.
pub async fn delete_ticket(pool: &PgPool, id: i64) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every ticket.
pub async fn delete_all_tickets(pool: &PgPool) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM tickets").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Append an audit entry.
pub async fn insert_audit_log(
    pool: &PgPool,
    event: &str,
    detail: &str,
    source: &str,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO audit_log (event, detail, source) VALUES ($1, $2, $3)")
        .bind(event)
        .bind(detail)
        .bind(source)
        .execute(pool)
        .await?;
    Ok(())
}

type AuditRow = (i64, String, String, String, DateTime<Utc>);

/// A page of audit entries, newest first. `search` matches event, detail or
/// source case-insensitively.
pub async fn list_audit_log(
    pool: &PgPool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditRecord>, StoreError> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT id, event, detail, source, created_at FROM audit_log \
         WHERE $1::text IS NULL \
            OR strpos(lower(event || ' ' || detail || ' ' || source), lower($1)) > 0 \
         ORDER BY id DESC LIMIT $2 OFFSET $3",
    )
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, event, detail, source, created_at)| AuditRecord {
            id,
            event,
            detail,
            source,
            created_at,
        })
        .collect())
}
