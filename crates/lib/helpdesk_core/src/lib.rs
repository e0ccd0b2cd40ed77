//! # helpdesk_core
//!
//! Core domain logic for the helpdesk: credential hashing, signed identity
//! tokens, encrypted local sessions, login lockout, role-based access
//! control, ticket workflows, and technician skill matching.

pub mod audit;
pub mod auth;
pub mod config;
pub mod migrate;
pub mod models;
pub mod skills;
pub mod store;
pub mod tickets;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
