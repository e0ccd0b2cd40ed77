//! Authentication service — login with lockout, registration, password
//! changes and account unlock.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::access::{self, Action};
use super::jwt::TokenIssuer;
use super::password::{hash_password, validate_password_strength, verify_password};
use super::AuthError;
use crate::audit::{AuditEvent, AuditSink};
use crate::config::{DEFAULT_LOCKOUT_THRESHOLD, SecurityConfig};
use crate::models::auth::{Identity, NewIdentity, Role, TokenClaims};
use crate::skills::encode_skills;
use crate::store::{IdentityStore, StoreError};

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub account_id: Option<i64>,
    /// Only kept for technicians.
    pub skills: Vec<String>,
}

/// Validates credentials against the identity store and mints tokens.
pub struct Authenticator {
    identities: Arc<dyn IdentityStore>,
    audit: Arc<dyn AuditSink>,
    issuer: TokenIssuer,
    lockout_threshold: i32,
}

impl Authenticator {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        audit: Arc<dyn AuditSink>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            identities,
            audit,
            issuer,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
        }
    }

    pub fn from_config(
        identities: Arc<dyn IdentityStore>,
        audit: Arc<dyn AuditSink>,
        config: &SecurityConfig,
    ) -> Self {
        Self::new(identities, audit, config.token_issuer())
            .with_lockout_threshold(config.lockout_threshold)
    }

    /// Failed attempts that lock an account. `SecurityConfig::from_env`
    /// only yields values in `1..=MAX_LOCKOUT_THRESHOLD`.
    pub fn with_lockout_threshold(mut self, threshold: i32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Check `email`/`password` and return a fresh token.
    ///
    /// A locked account is refused before the password is looked at. A wrong
    /// password bumps the failure counter and locks the account at the
    /// threshold; a correct one clears both and stamps `last_login`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        source: &str,
    ) -> Result<String, AuthError> {
        let email = email.trim();

        let Some(mut identity) = self.identities.find_identity_by_email(email).await? else {
            warn!(email, source, "login failed: unknown email");
            self.record(AuditEvent::LoginFailed { email: email.into() }, source)
                .await;
            return Err(AuthError::InvalidCredentials);
        };

        if identity.locked {
            warn!(email, source, "login refused: account locked");
            self.record(AuditEvent::LoginRejectedLocked { email: email.into() }, source)
                .await;
            return Err(AuthError::AccountLocked);
        }

        if !verify_password(password, &identity.password_hash) {
            identity.failed_attempts += 1;
            let just_locked = identity.failed_attempts >= self.lockout_threshold;
            if just_locked {
                identity.locked = true;
            }
            self.identities.save_identity(&identity).await?;

            warn!(
                email,
                source,
                failed_attempts = identity.failed_attempts,
                "login failed: wrong password"
            );
            self.record(AuditEvent::LoginFailed { email: email.into() }, source)
                .await;
            if just_locked {
                warn!(email, "account locked after repeated failures");
                self.record(AuditEvent::AccountLocked { email: email.into() }, source)
                    .await;
            }
            return Err(AuthError::InvalidCredentials);
        }

        identity.failed_attempts = 0;
        identity.locked = false;
        identity.last_login = Some(Utc::now());
        self.identities.save_identity(&identity).await?;

        let token = self
            .issuer
            .issue(identity.id, &identity.email, &identity.role)?;

        info!(email = %identity.email, role = %identity.role, source, "login succeeded");
        self.record(
            AuditEvent::LoginSucceeded {
                email: identity.email.clone(),
            },
            source,
        )
        .await;
        Ok(token)
    }

    /// Create an account.
    ///
    /// With an `actor` the call is an admin action and any concrete role may
    /// be created. Without one it is self-service and only `client` accounts
    /// are allowed.
    pub async fn register(
        &self,
        registration: Registration,
        actor: Option<&TokenClaims>,
        source: &str,
    ) -> Result<Identity, AuthError> {
        match actor {
            Some(claims) => {
                access::authorize(claims, Action::RegisterUser, self.audit.as_ref(), source)
                    .await?
            }
            None if registration.role != Role::Client => {
                warn!(role = %registration.role, source, "self-registration with elevated role refused");
                return Err(AuthError::Forbidden(Action::RegisterUser.to_string()));
            }
            None => {}
        }

        if !registration.role.is_known() {
            return Err(AuthError::Validation(format!(
                "unknown role: {}",
                registration.role
            )));
        }

        let email = registration.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("A valid email is required".into()));
        }
        validate_password_strength(&registration.password)?;

        let skills = (registration.role == Role::Tech && !registration.skills.is_empty())
            .then(|| encode_skills(&registration.skills));

        let new = NewIdentity {
            email,
            password_hash: hash_password(&registration.password)?,
            role: registration.role,
            account_id: registration.account_id,
            skills,
        };

        let identity = match self.identities.create_identity(new).await {
            Ok(identity) => identity,
            Err(StoreError::Conflict(_)) => {
                return Err(AuthError::Validation("Email already registered".into()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(email = %identity.email, role = %identity.role, "identity registered");
        self.record(
            AuditEvent::IdentityRegistered {
                actor_id: actor.map(|c| c.user_id),
                email: identity.email.clone(),
                role: identity.role.clone(),
            },
            source,
        )
        .await;
        Ok(identity)
    }

    /// Change a password with proof of the current one.
    pub async fn reset_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
        source: &str,
    ) -> Result<(), AuthError> {
        validate_password_strength(new_password)?;

        let email = email.trim();
        let Some(mut identity) = self.identities.find_identity_by_email(email).await? else {
            warn!(email, source, "password reset for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(current_password, &identity.password_hash) {
            warn!(email, source, "password reset with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        identity.password_hash = hash_password(new_password)?;
        self.identities.save_identity(&identity).await?;

        info!(email, "password changed");
        self.record(AuditEvent::PasswordChanged { email: email.into() }, source)
            .await;
        Ok(())
    }

    /// Set another user's password. Admin only; no proof of the old password.
    pub async fn admin_reset_password(
        &self,
        actor: &TokenClaims,
        email: &str,
        new_password: &str,
        source: &str,
    ) -> Result<(), AuthError> {
        access::authorize(actor, Action::AdminResetPassword, self.audit.as_ref(), source).await?;
        validate_password_strength(new_password)?;

        let email = email.trim();
        let mut identity = self
            .identities
            .find_identity_by_email(email)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(email.to_string()))?;

        identity.password_hash = hash_password(new_password)?;
        self.identities.save_identity(&identity).await?;

        info!(admin_id = actor.user_id, email, "admin reset password");
        self.record(
            AuditEvent::AdminPasswordReset {
                actor_id: actor.user_id,
                email: email.into(),
            },
            source,
        )
        .await;
        Ok(())
    }

    /// Clear a lockout. Returns whether the account was locked.
    pub async fn unlock_identity(
        &self,
        actor: &TokenClaims,
        email: &str,
        source: &str,
    ) -> Result<bool, AuthError> {
        access::authorize(actor, Action::UnlockUser, self.audit.as_ref(), source).await?;

        let email = email.trim();
        let mut identity = self
            .identities
            .find_identity_by_email(email)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(email.to_string()))?;

        if !identity.locked {
            return Ok(false);
        }

        identity.locked = false;
        identity.failed_attempts = 0;
        self.identities.save_identity(&identity).await?;

        info!(admin_id = actor.user_id, email, "account unlocked");
        self.record(
            AuditEvent::IdentityUnlocked {
                actor_id: actor.user_id,
                email: email.into(),
            },
            source,
        )
        .await;
        Ok(true)
    }

    /// Delete an account by id, returning the removed identity. Admins cannot
    /// delete themselves, and a client that still owns tickets is a
    /// `Conflict`.
    pub async fn delete_user(
        &self,
        actor: &TokenClaims,
        user_id: i64,
        source: &str,
    ) -> Result<Identity, AuthError> {
        access::authorize(actor, Action::DeleteUser, self.audit.as_ref(), source).await?;
        if actor.user_id == user_id {
            return Err(AuthError::Validation("You cannot delete your own account".into()));
        }

        let identity = self
            .identities
            .find_identity_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(format!("#{user_id}")))?;
        if !self.identities.delete_identity(user_id).await? {
            warn!(user_id, "identity vanished before delete");
            return Err(AuthError::UnknownIdentity(format!("#{user_id}")));
        }

        info!(admin_id = actor.user_id, email = %identity.email, "identity deleted");
        self.record(
            AuditEvent::IdentityDeleted {
                actor_id: actor.user_id,
                email: identity.email.clone(),
            },
            source,
        )
        .await;
        Ok(identity)
    }

    /// Record a logout. The token itself stays valid until it expires.
    pub async fn logout(&self, claims: &TokenClaims, source: &str) {
        self.record(
            AuditEvent::Logout {
                user_id: claims.user_id,
            },
            source,
        )
        .await;
    }

    async fn record(&self, event: AuditEvent, source: &str) {
        self.audit.record(event, source).await;
    }
}
