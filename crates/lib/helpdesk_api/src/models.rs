//! Request and response bodies.

use helpdesk_core::models::auth::{Identity, Role, TokenClaims};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

/// The caller as seen through their token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub expires_at: i64,
}

impl From<TokenClaims> for MeResponse {
    fn from(c: TokenClaims) -> Self {
        Self {
            user_id: c.user_id,
            email: c.email,
            role: c.role,
            expires_at: c.exp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Ignored for self-service registration, which always creates a client.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Public view of an identity; never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub account_id: Option<i64>,
    pub skills: Vec<String>,
}

impl From<Identity> for IdentityResponse {
    fn from(i: Identity) -> Self {
        let skills = i
            .skills
            .as_deref()
            .and_then(|raw| helpdesk_core::skills::parse_skills(raw).ok())
            .unwrap_or_default();
        Self {
            id: i.id,
            email: i.email,
            role: i.role,
            account_id: i.account_id,
            skills,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlockRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub email: String,
    pub was_locked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub skills_needed: Vec<String>,
}

/// Body of `PATCH /tickets/{id}`; omitted fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Query string of `GET /admin/logs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Body of `POST /admin/maintenance/clear`; `confirm` must be `true`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearDatabaseRequest {
    #[serde(default)]
    pub confirm: bool,
}
