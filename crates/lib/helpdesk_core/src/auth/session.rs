//! Encrypted local session file for the CLI.
//!
//! The token is sealed with AES-256-GCM under a key derived from the
//! configured passphrase. A random 12-byte nonce is prepended to the
//! ciphertext and the whole blob is base64-encoded before it is written.
//!
//! Loading always re-verifies the token. Any failure (missing file, bad
//! base64, failed decryption, invalid or expired token) is logged with its
//! cause, the stale file is removed, and the caller sees `SessionExpired`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::jwt::TokenIssuer;
use super::AuthError;
use crate::models::auth::TokenClaims;

/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// AES-256 key size (32 bytes).
const KEY_SIZE: usize = 32;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;

/// Derive a 32-byte key from a passphrase using SHA-256.
pub fn derive_key(passphrase: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&result);
    key
}

/// Single-file session store at a well-known path.
#[derive(Clone)]
pub struct SessionStore {
    path: PathBuf,
    key: [u8; KEY_SIZE],
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, key: [u8; KEY_SIZE]) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    /// Build a store whose key is derived from `passphrase`.
    pub fn with_passphrase(path: impl Into<PathBuf>, passphrase: &str) -> Self {
        Self::new(path, derive_key(passphrase))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and persist a token, readable by the owning user only.
    pub fn save(&self, token: &str) -> Result<(), AuthError> {
        let blob = self.encrypt(token)?;
        write_private(&self.path, blob.as_bytes())
            .map_err(|e| AuthError::Internal(format!("write session file: {e}")))?;
        info!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Read, decrypt and verify the persisted token.
    pub fn load(&self, issuer: &TokenIssuer) -> Result<String, AuthError> {
        self.load_verified(issuer).map(|(token, _)| token)
    }

    /// Like [`load`](Self::load) but returns the verified claims.
    pub fn load_claims(&self, issuer: &TokenIssuer) -> Result<TokenClaims, AuthError> {
        self.load_verified(issuer).map(|(_, claims)| claims)
    }

    fn load_verified(&self, issuer: &TokenIssuer) -> Result<(String, TokenClaims), AuthError> {
        let blob = match fs::read_to_string(&self.path) {
            Ok(blob) => blob,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no session file");
                return Err(AuthError::SessionExpired);
            }
        };

        let token = match self.decrypt(blob.trim()) {
            Ok(token) => token,
            Err(cause) => {
                warn!(cause = %cause, "failed to decrypt session, clearing");
                self.discard();
                return Err(AuthError::SessionExpired);
            }
        };

        match issuer.verify(&token) {
            Ok(claims) => {
                debug!(user_id = claims.user_id, "session loaded");
                Ok((token, claims))
            }
            Err(e) => {
                warn!(error = %e, "session token rejected, clearing");
                self.discard();
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Delete the session file. A missing file is not an error.
    pub fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Internal(format!("remove session file: {e}"))),
        }
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to remove stale session");
        }
    }

    /// Returns base64 `nonce || ciphertext || tag`.
    fn encrypt(&self, plaintext: &str) -> Result<String, AuthError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::Internal(format!("key init failed: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AuthError::Internal(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    /// The error is a log-only description of the failed step.
    fn decrypt(&self, encoded: &str) -> Result<String, String> {
        let combined = STANDARD
            .decode(encoded)
            .map_err(|e| format!("base64 decode failed: {e}"))?;

        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err("ciphertext too short".into());
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| format!("key init failed: {e}"))?;

        let nonce = Nonce::from_slice(&combined[..NONCE_SIZE]);
        let plaintext = cipher
            .decrypt(nonce, &combined[NONCE_SIZE..])
            .map_err(|e| format!("decryption failed: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| format!("utf-8 decode failed: {e}"))
    }
}

/// Write `contents` to `path`, readable by the owner only.
#[cfg(unix)]
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use chrono::{Duration, Utc};

    fn fixture() -> (tempfile::TempDir, SessionStore, TokenIssuer) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_passphrase(dir.path().join("session"), "test-key");
        (dir, store, TokenIssuer::new(b"test-secret"))
    }

    #[test]
    fn save_then_load_round_trip() {
        let (_dir, store, issuer) = fixture();
        let token = issuer.issue(3, "c@example.com", &Role::Client).unwrap();
        store.save(&token).unwrap();

        let loaded = store.load(&issuer).unwrap();
        assert_eq!(loaded, token);
        assert_eq!(issuer.verify(&loaded), issuer.verify(&token));
    }

    #[test]
    fn blob_is_not_plaintext() {
        let (_dir, store, issuer) = fixture();
        let token = issuer.issue(3, "c@example.com", &Role::Client).unwrap();
        store.save(&token).unwrap();
        let blob = fs::read_to_string(store.path()).unwrap();
        assert!(!blob.contains(&token));
        assert!(STANDARD.decode(&blob).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store, issuer) = fixture();
        store.save(&issuer.issue(1, "a@b.c", &Role::Admin).unwrap()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_file_is_session_expired() {
        let (_dir, store, issuer) = fixture();
        assert!(matches!(store.load(&issuer), Err(AuthError::SessionExpired)));
    }

    #[test]
    fn corrupted_blob_is_expired_and_removed() {
        let (_dir, store, issuer) = fixture();
        store.save(&issuer.issue(1, "a@b.c", &Role::Admin).unwrap()).unwrap();

        let mut blob = fs::read(store.path()).unwrap();
        let idx = blob.len() / 2;
        blob[idx] = if blob[idx] == b'A' { b'B' } else { b'A' };
        fs::write(store.path(), &blob).unwrap();

        assert!(matches!(store.load(&issuer), Err(AuthError::SessionExpired)));
        assert!(!store.path().exists());
    }

    #[test]
    fn wrong_key_is_expired_and_removed() {
        let (dir, store, issuer) = fixture();
        store.save(&issuer.issue(1, "a@b.c", &Role::Admin).unwrap()).unwrap();

        let other = SessionStore::with_passphrase(dir.path().join("session"), "other-key");
        assert!(matches!(other.load(&issuer), Err(AuthError::SessionExpired)));
        assert!(!store.path().exists());
    }

    #[test]
    fn expired_token_is_expired_and_removed() {
        let (_dir, store, issuer) = fixture();
        let stale = issuer
            .issue_at(1, "a@b.c", &Role::Tech, Utc::now() - Duration::hours(48))
            .unwrap();
        store.save(&stale).unwrap();

        assert!(matches!(store.load(&issuer), Err(AuthError::SessionExpired)));
        assert!(!store.path().exists());
    }

    #[test]
    fn token_from_other_secret_is_expired() {
        let (_dir, store, issuer) = fixture();
        let foreign = TokenIssuer::new(b"someone-else");
        store.save(&foreign.issue(1, "a@b.c", &Role::Admin).unwrap()).unwrap();
        assert!(matches!(store.load(&issuer), Err(AuthError::SessionExpired)));
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store, issuer) = fixture();
        store.clear().unwrap();
        store.save(&issuer.issue(1, "a@b.c", &Role::Admin).unwrap()).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn load_claims_returns_identity() {
        let (_dir, store, issuer) = fixture();
        store.save(&issuer.issue(9, "t@example.com", &Role::Tech).unwrap()).unwrap();
        let claims = store.load_claims(&issuer).unwrap();
        assert_eq!(claims.user_id, 9);
        assert_eq!(claims.role, Role::Tech);
    }
}
