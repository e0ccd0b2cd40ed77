//! Command implementations. Every command that acts on behalf of a user
//! loads the encrypted session first, so a missing or invalid session fails
//! with "Session expired" before any database connection is made.

use std::sync::Arc;

use chrono::DateTime;
use helpdesk_core::audit::{
    AuditEvent, AuditQuery, AuditSink, AuditViewer, LOCAL_SOURCE, PgAuditSink, TracingAuditSink,
};
use helpdesk_core::auth::{AuthError, Authenticator, SessionStore, TokenIssuer};
use helpdesk_core::config::SecurityConfig;
use helpdesk_core::models::auth::TokenClaims;
use helpdesk_core::store::PgStore;
use helpdesk_core::tickets::TicketService;
use log::info;
use sqlx::postgres::PgPoolOptions;

use crate::Result;
use crate::cli::{Cli, Commands};

struct Services {
    auth: Authenticator,
    tickets: TicketService,
    audit_log: AuditViewer,
}

struct Context {
    config: SecurityConfig,
    issuer: TokenIssuer,
    sessions: SessionStore,
    database_url: String,
}

impl Context {
    fn claims(&self) -> Result<TokenClaims> {
        Ok(self.sessions.load_claims(&self.issuer)?)
    }

    async fn services(&self) -> Result<Services> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.database_url)
            .await?;
        helpdesk_core::migrate::migrate(&pool).await?;

        let store = Arc::new(PgStore::new(pool.clone()));
        let pg_audit = Arc::new(PgAuditSink::new(pool));
        let audit: Arc<dyn AuditSink> = pg_audit.clone();
        Ok(Services {
            auth: Authenticator::from_config(store.clone(), audit.clone(), &self.config),
            tickets: TicketService::new(store.clone(), store, audit.clone()),
            audit_log: AuditViewer::new(pg_audit, audit),
        })
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let config = SecurityConfig::from_env()?;
    let ctx = Context {
        issuer: config.token_issuer(),
        sessions: config.session_store(),
        config,
        database_url: args.database_url,
    };

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }

        Commands::Login { email, password } => {
            let services = ctx.services().await?;
            let token = services.auth.authenticate(&email, &password, LOCAL_SOURCE).await?;
            ctx.sessions.save(&token)?;
            info!("Logged in as {}", email.trim());
        }

        Commands::Logout => {
            if let Ok(claims) = ctx.claims() {
                TracingAuditSink
                    .record(
                        AuditEvent::Logout {
                            user_id: claims.user_id,
                        },
                        LOCAL_SOURCE,
                    )
                    .await;
            }
            ctx.sessions.clear()?;
            info!("Logged out");
        }

        Commands::Whoami => {
            let claims = ctx.claims()?;
            let expires = DateTime::from_timestamp(claims.exp, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| claims.exp.to_string());
            println!(
                "{} ({}) user #{}, session expires {}",
                claims.email, claims.role, claims.user_id, expires
            );
        }

        Commands::Passwd {
            current,
            new_password,
        } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            services.auth.reset_password(&claims.email, &current, &new_password, LOCAL_SOURCE)
                .await?;
            info!("Password updated");
        }

        Commands::Unlock { email } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            if services.auth.unlock_identity(&claims, &email, LOCAL_SOURCE).await? {
                info!("Unlocked {}", email.trim());
            } else {
                info!("{} was not locked", email.trim());
            }
        }

        Commands::AdminReset {
            email,
            new_password,
        } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            services.auth.admin_reset_password(&claims, &email, &new_password, LOCAL_SOURCE)
                .await?;
            info!("Password reset for {}", email.trim());
        }

        Commands::Match { skills } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            let matches = services.tickets.match_skills(&claims, skills, LOCAL_SOURCE).await?;
            if matches.candidates.is_empty() {
                info!("No technicians match {}", matches.needed.join(", "));
            }
            for (rank, tech) in matches.candidates.iter().enumerate() {
                println!(
                    "{:>2}. {:<32} score {}/{}  [{}]",
                    rank + 1,
                    tech.email,
                    tech.score,
                    matches.needed.len(),
                    tech.skills.join(", ")
                );
            }
        }

        Commands::DeleteUser { id } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            let removed = services.auth.delete_user(&claims, id, LOCAL_SOURCE).await?;
            info!("Deleted user #{} ({})", removed.id, removed.email);
        }

        Commands::Logs {
            search,
            page,
            limit,
        } => {
            let claims = ctx.claims()?;
            let services = ctx.services().await?;
            let query = AuditQuery::new(search, Some(page), Some(limit));
            let entries = services
                .audit_log
                .view_logs(&claims, &query, LOCAL_SOURCE)
                .await?;
            if entries.is_empty() {
                info!("No audit entries on page {}", query.page);
            }
            for entry in entries {
                println!(
                    "{}  {:<22} {:<16} {}",
                    entry.created_at.to_rfc3339(),
                    entry.event,
                    entry.source,
                    entry.detail
                );
            }
        }

        Commands::ClearDatabase { yes } => {
            let claims = ctx.claims()?;
            if !yes {
                return Err(AuthError::Validation(
                    "clear-database deletes every ticket and account; pass --yes to confirm"
                        .into(),
                )
                .into());
            }
            let services = ctx.services().await?;
            let summary = services.tickets.clear_database(&claims, LOCAL_SOURCE).await?;
            info!(
                "Database cleared: {} tickets and {} accounts removed",
                summary.tickets, summary.identities
            );
        }
    }

    Ok(())
}
