//! Helpdesk API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use helpdesk_api::config::ApiConfig;
use helpdesk_core::audit::PgAuditSink;
use helpdesk_core::store::PgStore;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "helpdesk_server", about = "Helpdesk API server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/helpdesk"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Audit the `X-Forwarded-For` address. Only for deployments behind a
    /// proxy that sets the header. Also enabled by `HELPDESK_TRUST_PROXY`.
    #[arg(long)]
    trust_proxy: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(
                    "info,helpdesk_api=debug,helpdesk_core=debug",
                ))?,
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    config.bind_addr = args.bind_addr;
    config.pg_connection_url = args.database_url;
    config.trust_forwarded_for |= args.trust_proxy;

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        lockout_threshold = config.security.lockout_threshold,
        trust_forwarded_for = config.trust_forwarded_for,
        "starting helpdesk_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    helpdesk_api::migrate(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let audit = Arc::new(PgAuditSink::new(pool));
    let state = helpdesk_api::AppState::new(store.clone(), store, audit, config.clone());
    let app = helpdesk_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await?;

    Ok(())
}
