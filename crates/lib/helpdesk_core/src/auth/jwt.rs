//! JWT token generation and verification.
//!
//! Tokens are HS256-signed, self-contained claim sets. There is no
//! server-side session table and no revocation list: a token stays valid
//! until its `exp` instant.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};

use super::session::write_private;
use super::{AuthError, TokenError};
use crate::models::auth::{Role, TokenClaims};

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

const ALGORITHM: Algorithm = Algorithm::HS256;

const GENERATED_SECRET_LEN: usize = 64;

/// Issues and verifies signed session tokens with a single symmetric secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer with the default 24h lifetime.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Self {
        // Only HS256 is accepted, so a token re-signed with another
        // algorithm (or `none`) fails before its claims are trusted.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for the given identity, expiring `ttl` from now.
    pub fn issue(&self, user_id: i64, email: &str, role: &Role) -> Result<String, AuthError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    /// Mint a token as if issued at `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            user_id,
            email: email.to_string(),
            role: role.clone(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning its claims on success.
    ///
    /// The signature is checked before expiry, so an expired token only
    /// reports `Expired` when it was genuinely signed with this secret.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token.trim(), &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    debug!(error = %e, "token rejected");
                    TokenError::InvalidSignature
                }
            })
    }
}

/// Resolve the JWT secret: env var `HELPDESK_JWT_SECRET`, then `JWT_SECRET`,
/// then the secret file under the user data dir (created on first use).
pub fn resolve_jwt_secret() -> String {
    for var in ["HELPDESK_JWT_SECRET", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    load_or_create_secret(&jwt_secret_path())
}

/// Read the signing secret stored at `path`, or generate one and store it
/// there with owner-only permissions.
///
/// A secret that cannot be stored is still returned, so the process can
/// run, but tokens it issues will not verify in the next process.
pub(crate) fn load_or_create_secret(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => return existing.trim().to_string(),
        Ok(_) => debug!(path = %path.display(), "JWT secret file is empty"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot read JWT secret file"),
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect();
    match store_secret(path, &secret) {
        Ok(()) => info!(path = %path.display(), "generated new JWT secret"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "generated JWT secret could not be saved; tokens will not outlive this process"
        ),
    }
    secret
}

fn store_secret(path: &Path, secret: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_private(path, secret.as_bytes())
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("helpdesk")
        .join("jwt-secret")
}
