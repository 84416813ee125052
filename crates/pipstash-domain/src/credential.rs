//! Password hashing and verification.
//!
//! New accounts store an Argon2id hash in PHC string format with a fresh
//! random salt. Accounts created before hashing landed hold the raw password;
//! the stored record's shape tells the two apart, so both verify through the
//! same entry point and legacy accounts keep working without a migration.

use argon2::{
    password_hash::{rand_core, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

const PHC_ARGON2_PREFIX: &str = "$argon2";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// How a stored secret record verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretScheme {
    /// Raw password stored verbatim (pre-hardening accounts).
    LegacyPlaintext,
    /// Argon2id PHC string with embedded salt.
    Argon2,
}

impl SecretScheme {
    pub fn of(stored: &str) -> Self {
        if stored.starts_with(PHC_ARGON2_PREFIX) {
            Self::Argon2
        } else {
            Self::LegacyPlaintext
        }
    }
}

/// Hashes a password for storage, generating a fresh salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| CredentialError::Hash(err.to_string()))?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored secret record of either scheme.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match SecretScheme::of(stored) {
        SecretScheme::Argon2 => PasswordHash::new(stored)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false),
        SecretScheme::LegacyPlaintext => stored == password,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies_and_rejects() {
        let stored = hash_password("pw1").unwrap();
        assert_eq!(SecretScheme::of(&stored), SecretScheme::Argon2);
        assert!(verify_password("pw1", &stored));
        assert!(!verify_password("pw2", &stored));
    }

    #[test]
    fn fresh_salt_per_hash() {
        let a = hash_password("pw1").unwrap();
        let b = hash_password("pw1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_plaintext_record_verifies_by_equality() {
        assert_eq!(SecretScheme::of("hunter2"), SecretScheme::LegacyPlaintext);
        assert!(verify_password("hunter2", "hunter2"));
        assert!(!verify_password("hunter3", "hunter2"));
    }

    #[test]
    fn malformed_phc_record_never_verifies() {
        assert!(!verify_password("pw", "$argon2id$not-a-real-record"));
    }
}
