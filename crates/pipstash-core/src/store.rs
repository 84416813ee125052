//! Key-value store access.
//!
//! The store needs exactly two record shapes: a `users` hash mapping
//! username to secret, and one string per username holding the manifest
//! text. `KvStore` is the seam between the workflow and the wire; the
//! Redis implementation is the only one used in production, and tests
//! substitute an in-memory map.

use tracing::debug;

use crate::config::StoreConfig;

/// Hash collection holding `username -> secret` records.
pub const USERS_COLLECTION: &str = "users";

/// Errors surfaced by the key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("[PS300] store is unreachable: {0}")]
    Unavailable(String),
    #[error("[PS301] store command failed: {0}")]
    Command(String),
}

/// The store primitives the account and manifest workflow needs.
pub trait KvStore {
    fn hash_get(&mut self, collection: &str, field: &str) -> Result<Option<String>, StoreError>;
    fn hash_set(&mut self, collection: &str, field: &str, value: &str) -> Result<(), StoreError>;
    fn hash_exists(&mut self, collection: &str, field: &str) -> Result<bool, StoreError>;
    fn string_get(&mut self, key: &str) -> Result<Option<String>, StoreError>;
    fn string_set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Blocking Redis client behind the [`KvStore`] seam.
pub struct RedisStore {
    connection: redis::Connection,
}

impl RedisStore {
    /// Opens a connection using the configured URL or host/port parts.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when the server cannot be reached.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config.connection_url();
        let client = redis::Client::open(url.as_str())
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let connection = client
            .get_connection()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        debug!(host = %config.host, port = config.port, "connected to store");
        Ok(Self { connection })
    }
}

fn classify(err: &redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

impl KvStore for RedisStore {
    fn hash_get(&mut self, collection: &str, field: &str) -> Result<Option<String>, StoreError> {
        redis::Commands::hget(&mut self.connection, collection, field)
            .map_err(|err| classify(&err))
    }

    fn hash_set(&mut self, collection: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _: () = redis::Commands::hset(&mut self.connection, collection, field, value)
            .map_err(|err| classify(&err))?;
        Ok(())
    }

    fn hash_exists(&mut self, collection: &str, field: &str) -> Result<bool, StoreError> {
        redis::Commands::hexists(&mut self.connection, collection, field)
            .map_err(|err| classify(&err))
    }

    fn string_get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        redis::Commands::get(&mut self.connection, key).map_err(|err| classify(&err))
    }

    fn string_set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _: () =
            redis::Commands::set(&mut self.connection, key, value).map_err(|err| classify(&err))?;
        Ok(())
    }
}

/// Account-facing view over the store: secrets in the `users` hash,
/// manifests in per-username string slots.
pub struct CredentialStore {
    store: Box<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn has_account(&mut self, username: &str) -> Result<bool, StoreError> {
        self.store.hash_exists(USERS_COLLECTION, username)
    }

    pub fn secret_for(&mut self, username: &str) -> Result<Option<String>, StoreError> {
        self.store.hash_get(USERS_COLLECTION, username)
    }

    pub fn record_secret(&mut self, username: &str, secret: &str) -> Result<(), StoreError> {
        self.store.hash_set(USERS_COLLECTION, username, secret)
    }

    pub fn manifest_for(&mut self, username: &str) -> Result<Option<String>, StoreError> {
        self.store.string_get(username)
    }

    pub fn store_manifest(&mut self, username: &str, text: &str) -> Result<(), StoreError> {
        debug!(username, bytes = text.len(), "storing manifest");
        self.store.string_set(username, text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::{CredentialStore, KvStore, StoreError};

    /// In-memory stand-in for the Redis store.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryStore {
        hashes: HashMap<String, HashMap<String, String>>,
        strings: HashMap<String, String>,
    }

    impl KvStore for MemoryStore {
        fn hash_get(
            &mut self,
            collection: &str,
            field: &str,
        ) -> Result<Option<String>, StoreError> {
            Ok(self
                .hashes
                .get(collection)
                .and_then(|fields| fields.get(field))
                .cloned())
        }

        fn hash_set(
            &mut self,
            collection: &str,
            field: &str,
            value: &str,
        ) -> Result<(), StoreError> {
            self.hashes
                .entry(collection.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
            Ok(())
        }

        fn hash_exists(&mut self, collection: &str, field: &str) -> Result<bool, StoreError> {
            Ok(self
                .hashes
                .get(collection)
                .is_some_and(|fields| fields.contains_key(field)))
        }

        fn string_get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.strings.get(key).cloned())
        }

        fn string_set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.strings.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    pub(crate) fn memory_credentials() -> CredentialStore {
        CredentialStore::new(Box::new(MemoryStore::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::memory_credentials;

    #[test]
    fn secrets_and_manifests_use_separate_namespaces() {
        let mut creds = memory_credentials();
        creds.record_secret("alice", "secret").unwrap();
        creds.store_manifest("alice", "requests==2.31.0").unwrap();

        assert!(creds.has_account("alice").unwrap());
        assert_eq!(creds.secret_for("alice").unwrap().unwrap(), "secret");
        assert_eq!(
            creds.manifest_for("alice").unwrap().unwrap(),
            "requests==2.31.0"
        );
        assert!(!creds.has_account("bob").unwrap());
        assert!(creds.manifest_for("bob").unwrap().is_none());
    }
}
