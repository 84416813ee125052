//! Signup and login against the shared store.
//!
//! Outcomes are plain enums rather than errors: a taken username or a bad
//! password is an expected answer, not a fault. Only store or hashing
//! problems surface as `Err`.

use pipstash_domain::credential;
use tracing::debug;

use crate::session::Session;
use crate::store::{CredentialStore, StoreError};

/// A registered account name. The username doubles as the manifest key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    Created(Identity),
    AlreadyExists,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(Identity),
    /// Covers both an unknown username and a wrong password; callers are
    /// not told which, so probing for account existence learns nothing.
    InvalidCredentials,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] pipstash_domain::CredentialError),
}

/// Creates an account and signs it in. The stored secret is always a
/// salted hash; the password itself is never persisted.
pub fn signup(
    creds: &mut CredentialStore,
    session: &mut Session,
    username: &str,
    password: &str,
) -> Result<SignupOutcome, AccountError> {
    if creds.has_account(username)? {
        debug!(username, "signup rejected, username taken");
        return Ok(SignupOutcome::AlreadyExists);
    }
    let secret = credential::hash_password(password)?;
    creds.record_secret(username, &secret)?;
    let identity = Identity {
        username: username.to_string(),
    };
    session.authenticate(identity.clone());
    Ok(SignupOutcome::Created(identity))
}

/// Verifies a password against the stored secret and signs the account in.
pub fn login(
    creds: &mut CredentialStore,
    session: &mut Session,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, AccountError> {
    let Some(stored) = creds.secret_for(username)? else {
        debug!(username, "login rejected, no such account");
        return Ok(LoginOutcome::InvalidCredentials);
    };
    if !credential::verify_password(password, &stored) {
        debug!(username, "login rejected, verification failed");
        return Ok(LoginOutcome::InvalidCredentials);
    }
    let identity = Identity {
        username: username.to_string(),
    };
    session.authenticate(identity.clone());
    Ok(LoginOutcome::Authenticated(identity))
}

/// Clears the session unconditionally.
pub fn logout(session: &mut Session) {
    session.clear();
}
