//! Security configuration: signing secret, session encryption key, session
//! file location, token lifetime and lockout threshold.
//!
//! Built once at startup and handed to [`TokenIssuer`], [`SessionStore`] and
//! [`Authenticator`] constructors.
//!
//! [`TokenIssuer`]: crate::auth::TokenIssuer
//! [`SessionStore`]: crate::auth::SessionStore
//! [`Authenticator`]: crate::auth::Authenticator

use std::ops::RangeInclusive;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use crate::auth::jwt::{DEFAULT_TOKEN_TTL_SECS, TokenIssuer, resolve_jwt_secret};
use crate::auth::session::SessionStore;

/// Failed attempts before an account locks.
pub const DEFAULT_LOCKOUT_THRESHOLD: i32 = 5;
pub const MAX_LOCKOUT_THRESHOLD: i32 = 100;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Session file name inside the OS temp directory.
pub const SESSION_FILE_NAME: &str = ".helpdesk_session";

const DEV_SESSION_KEY: &str = "helpdesk-session-default-dev-key-change-in-production";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Secrets and policy knobs for the auth subsystem.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Passphrase the AES-256 session key is derived from.
    pub session_key: String,
    /// Location of the encrypted CLI session blob.
    pub session_path: PathBuf,
    pub token_ttl_secs: i64,
    pub lockout_threshold: i32,
}

impl SecurityConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                       | Default                              |
    /// |--------------------------------|--------------------------------------|
    /// | `HELPDESK_JWT_SECRET` / `JWT_SECRET` | generated & persisted to file  |
    /// | `HELPDESK_SESSION_KEY`         | development key                      |
    /// | `HELPDESK_SESSION_FILE`        | `$TMPDIR/.helpdesk_session`          |
    /// | `HELPDESK_TOKEN_TTL_SECS`      | `86400`, at most one year            |
    /// | `HELPDESK_LOCKOUT_THRESHOLD`   | `5`, at most `100`                   |
    ///
    /// Numbers that fail to parse or fall outside their range are a
    /// [`ConfigError::Invalid`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            jwt_secret: resolve_jwt_secret(),
            session_key: std::env::var("HELPDESK_SESSION_KEY")
                .unwrap_or_else(|_| DEV_SESSION_KEY.into()),
            session_path: std::env::var("HELPDESK_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_session_path()),
            token_ttl_secs: parse_env(
                "HELPDESK_TOKEN_TTL_SECS",
                DEFAULT_TOKEN_TTL_SECS,
                1..=MAX_TOKEN_TTL_SECS,
            )?,
            lockout_threshold: parse_env(
                "HELPDESK_LOCKOUT_THRESHOLD",
                DEFAULT_LOCKOUT_THRESHOLD,
                1..=MAX_LOCKOUT_THRESHOLD,
            )?,
        })
    }

    /// Defaults with an explicit signing secret; nothing is read from the
    /// environment.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            session_key: DEV_SESSION_KEY.into(),
            session_path: default_session_path(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
        }
    }

    /// The lifetime is clamped to `1..=MAX_TOKEN_TTL_SECS` for configs
    /// built by hand.
    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::with_ttl(
            self.jwt_secret.as_bytes(),
            Duration::seconds(self.token_ttl_secs.clamp(1, MAX_TOKEN_TTL_SECS)),
        )
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::with_passphrase(&self.session_path, &self.session_key)
    }
}

/// `<os temp dir>/.helpdesk_session`
pub fn default_session_path() -> PathBuf {
    std::env::temp_dir().join(SESSION_FILE_NAME)
}

fn parse_env<T>(var: &'static str, default: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd,
{
    parse_bounded(var, std::env::var(var).ok(), default, range)
}

fn parse_bounded<T>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) if range.contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;

    #[test]
    fn default_session_path_is_in_temp_dir() {
        let path = default_session_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(SESSION_FILE_NAME));
    }

    #[test]
    fn with_secret_uses_defaults() {
        let config = SecurityConfig::with_secret("s3cret");
        assert_eq!(config.token_ttl_secs, 24 * 60 * 60);
        assert_eq!(config.lockout_threshold, 5);
    }

    #[test]
    fn issuer_uses_configured_secret_and_ttl() {
        let mut config = SecurityConfig::with_secret("s3cret");
        config.token_ttl_secs = 60;
        let issuer = config.token_issuer();
        let token = issuer.issue(1, "a@b.c", &Role::Admin).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 60);

        let other = SecurityConfig::with_secret("different").token_issuer();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: i32 = parse_env("HELPDESK_TEST_UNSET_VARIABLE", 7, 1..=10).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn ttl_outside_range_is_invalid() {
        let ttl = |raw: &str| {
            parse_bounded(
                "HELPDESK_TOKEN_TTL_SECS",
                Some(raw.to_string()),
                DEFAULT_TOKEN_TTL_SECS,
                1..=MAX_TOKEN_TTL_SECS,
            )
        };
        for raw in ["9223372036854775807", "0", "-60", "31536001", "soon"] {
            match ttl(raw) {
                Err(ConfigError::Invalid { var, value }) => {
                    assert_eq!(var, "HELPDESK_TOKEN_TTL_SECS");
                    assert_eq!(value, raw);
                }
                other => panic!("{raw} accepted: {other:?}"),
            }
        }
        assert_eq!(ttl(" 3600 ").unwrap(), 3600);
        assert_eq!(ttl("31536000").unwrap(), MAX_TOKEN_TTL_SECS);
    }

    #[test]
    fn lockout_threshold_outside_range_is_invalid() {
        let threshold = |raw: &str| {
            parse_bounded(
                "HELPDESK_LOCKOUT_THRESHOLD",
                Some(raw.to_string()),
                DEFAULT_LOCKOUT_THRESHOLD,
                1..=MAX_LOCKOUT_THRESHOLD,
            )
        };
        assert!(threshold("0").is_err());
        assert!(threshold("-3").is_err());
        assert!(threshold("101").is_err());
        assert_eq!(threshold("1").unwrap(), 1);
        assert_eq!(
            parse_bounded("X", None, DEFAULT_LOCKOUT_THRESHOLD, 1..=MAX_LOCKOUT_THRESHOLD).unwrap(),
            5
        );
    }

    #[test]
    fn hand_built_huge_ttl_does_not_panic() {
        let mut config = SecurityConfig::with_secret("s3cret");
        config.token_ttl_secs = i64::MAX;
        assert_eq!(config.token_issuer().ttl(), Duration::seconds(MAX_TOKEN_TTL_SECS));
    }
}
