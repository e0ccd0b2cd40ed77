//! Authentication and authorization logic.
//!
//! Provides password hashing and policy, JWT issuing/verification, the
//! encrypted local session file, the login service with lockout, and the
//! role-based access gate. Shared by `helpdesk_api` and the CLI.

pub mod access;
pub mod jwt;
pub mod password;
pub mod service;
pub mod session;

use thiserror::Error;

use crate::store::StoreError;

pub use access::{Action, TicketScope};
pub use jwt::TokenIssuer;
pub use service::{Authenticator, Registration};
pub use session::SessionStore;

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, or a token that cannot be decoded.
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Never says which.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked due to repeated failed attempts")]
    AccountLocked,

    #[error("Session expired")]
    SessionExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized role: {0}")]
    UnauthorizedRole(String),

    #[error(
        "Password must be 8-32 characters and include a capital letter, number, and special character"
    )]
    WeakPassword,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown user: {0}")]
    UnknownIdentity(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
