//! Authentication domain models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Stored and transmitted as a lowercase string.
///
/// Values outside the known set are preserved in `Unknown` so that a bad row
/// or a hand-crafted token is rejected explicitly instead of silently
/// defaulting to a real role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Tech,
    Client,
    Unknown(String),
}

impl Role {
    /// Parse a stored role string. Matching is exact (roles are lowercase).
    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "tech" => Role::Tech,
            "client" => Role::Client,
            other => Role::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Tech => "tech",
            Role::Client => "client",
            Role::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::parse(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A user account as seen by the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub failed_attempts: i32,
    pub locked: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub account_id: Option<i64>,
    /// Technician skills as stored: a JSON array of strings.
    pub skills: Option<String>,
}

/// Fields required to create an identity. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub account_id: Option<i64>,
    pub skills: Option<String>,
}

/// JWT claims embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Expiry (`expiresAt`, unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_known_values() {
        for raw in ["admin", "tech", "client"] {
            let role = Role::parse(raw);
            assert!(role.is_known());
            assert_eq!(role.as_str(), raw);
        }
    }

    #[test]
    fn role_keeps_unknown_value() {
        let role = Role::parse("superuser");
        assert_eq!(role, Role::Unknown("superuser".into()));
        assert!(!role.is_known());
        assert_eq!(role.to_string(), "superuser");
    }

    #[test]
    fn role_parse_is_case_sensitive() {
        assert_eq!(Role::parse("Admin"), Role::Unknown("Admin".into()));
    }

    #[test]
    fn claims_serialize_with_wire_names() {
        let claims = TokenClaims {
            user_id: 7,
            email: "a@b.c".into(),
            role: Role::Tech,
            exp: 100,
            iat: 10,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["userID"], 7);
        assert_eq!(json["role"], "tech");
        assert_eq!(json["exp"], 100);
    }
}
