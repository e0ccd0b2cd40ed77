//! API server configuration.

use helpdesk_core::config::{ConfigError, SecurityConfig};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Record the `X-Forwarded-For` client address instead of the peer.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Token secret, session key and lockout policy.
    pub security: SecurityConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable               | Default                              |
    /// |------------------------|--------------------------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`         | `postgres://localhost:5432/helpdesk` |
    /// | `HELPDESK_TRUST_PROXY` | `false`                              |
    ///
    /// plus everything read by [`SecurityConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/helpdesk".into()),
            trust_forwarded_for: parse_flag(
                "HELPDESK_TRUST_PROXY",
                std::env::var("HELPDESK_TRUST_PROXY").ok(),
            )?,
            security: SecurityConfig::from_env()?,
        })
    }
}

fn parse_flag(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
