//! Password hashing via bcrypt, and the password strength policy.

use tracing::debug;

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 32;
/// bcrypt reads at most 72 bytes, counting the trailing NUL it appends.
const MAX_PASSWORD_BYTES: usize = 71;

/// Hash a password with bcrypt (cost 10, random salt per hash).
///
/// Input longer than bcrypt's 72-byte limit is refused rather than
/// truncated.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::non_truncating_hash(password, BCRYPT_COST).map_err(|e| match e {
        bcrypt::BcryptError::Truncation(_) => AuthError::WeakPassword,
        e => AuthError::Internal(format!("bcrypt hash: {e}")),
    })
}

/// Verify a password against a bcrypt hash.
///
/// A malformed hash, or a candidate past the 72-byte limit, is a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::non_truncating_verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            debug!(error = %e, "bcrypt verify failed, treating as mismatch");
            false
        }
    }
}

/// Check a candidate password against the strength policy:
/// 8-32 characters (and at most 71 bytes) with at least one `A-Z` letter,
/// one `0-9` digit and one punctuation or symbol character.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len)
        || password.len() > MAX_PASSWORD_BYTES
    {
        return Err(AuthError::WeakPassword);
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(is_special);

    if has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

fn is_special(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Correct#Horse1").unwrap();
        assert!(verify_password("Correct#Horse1", &hash));
        assert!(!verify_password("Correct#Horse2", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("Same!Pass1").unwrap();
        let b = hash_password("Same!Pass1").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("Same!Pass1", &a));
        assert!(verify_password("Same!Pass1", &b));
    }

    #[test]
    fn malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn policy_rejects_missing_special() {
        assert!(matches!(
            validate_password_strength("Abc12345"),
            Err(AuthError::WeakPassword)
        ));
    }

    #[test]
    fn policy_accepts_minimal_valid() {
        assert!(validate_password_strength("Abc123!@").is_ok());
    }

    #[test]
    fn policy_length_bounds() {
        let at_max = format!("Ab1!{}", "x".repeat(28));
        assert_eq!(at_max.len(), 32);
        assert!(validate_password_strength(&at_max).is_ok());

        let too_long = format!("Ab1!{}", "x".repeat(29));
        assert_eq!(too_long.len(), 33);
        assert!(validate_password_strength(&too_long).is_err());

        assert!(validate_password_strength("Ab1!xyz").is_err());
    }

    #[test]
    fn policy_requires_upper_and_digit() {
        assert!(validate_password_strength("abc123!@").is_err());
        assert!(validate_password_strength("Abcdefg!").is_err());
    }

    #[test]
    fn policy_counts_symbols_as_special() {
        assert!(validate_password_strength("Abc12345$").is_ok());
        assert!(validate_password_strength("Abc12345~").is_ok());
        assert!(validate_password_strength("Abc 12345").is_err());
    }

    #[test]
    fn policy_rejects_input_past_bcrypt_limit() {
        let long = format!("Ab1!{}", "\u{1F600}".repeat(18));
        assert_eq!(long.chars().count(), 22);
        assert_eq!(long.len(), 76);
        assert!(matches!(
            validate_password_strength(&long),
            Err(AuthError::WeakPassword)
        ));

        let fits = format!("Ab1{}", "\u{1F600}".repeat(17));
        assert_eq!(fits.len(), 71);
        assert!(validate_password_strength(&fits).is_ok());
    }

    #[test]
    fn long_passwords_are_not_truncated() {
        let p = format!("Ab1!{}", "\u{1F600}".repeat(18));
        let q = format!("Ab1!{}\u{1F603}", "\u{1F600}".repeat(17));
        assert!(matches!(hash_password(&p), Err(AuthError::WeakPassword)));

        let stored = hash_password(&format!("Ab1{}", "\u{1F600}".repeat(17))).unwrap();
        assert!(!verify_password(&p, &stored));
        assert!(!verify_password(&q, &stored));
    }

    #[test]
    fn policy_is_ascii_only_for_upper_and_digit() {
        // 'Ä' is not A-Z and '½' is not 0-9.
        assert!(validate_password_strength("\u{c4}bcdefg1!").is_err());
        assert!(validate_password_strength("Abcdefg\u{bd}!").is_err());
        assert!(validate_password_strength("\u{c4}Bcdefg1!").is_ok());
    }
}
