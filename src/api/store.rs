//! Secure storage for the access and refresh tokens.
//!
//! `KeychainStore` keeps tokens in the OS credential store via the `keyring`
//! crate, never on disk. `MemoryStore` is a process-local fallback used by
//! tests and throwaway sessions.

use std::collections::HashMap;
use std::future::Future;

use keyring::Entry;
use thiserror::Error;
use tokio::sync::Mutex;
use zeroize::Zeroize;

/// Keychain service name for all LMS credentials.
const SERVICE_NAME: &str = "com.lms.client";

/// Store key for the short-lived bearer token.
pub const ACCESS_TOKEN_KEY: &str = "authToken";

/// Store key for the long-lived refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential store operation failed: {0}")]
    OperationFailed(String),
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        StoreError::OperationFailed(err.to_string())
    }
}

/// Async key-value capability for credential persistence.
///
/// Futures are `Send` so a client holding a store can be shared across tasks.
pub trait CredentialStore: Send + Sync {
    /// Returns `None` if nothing is stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Idempotent: deleting a missing key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// OS keychain backed store (macOS Keychain, Windows Credential Manager,
/// Secret Service on Linux).
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl CredentialStore for KeychainStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        entry.set_password(value)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

/// In-memory store. Values are zeroed when overwritten or deleted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with the given entries.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }
}

impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(mut old) = entries.insert(key.to_string(), value.to_string()) {
            old.zeroize();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if let Some(mut old) = self.entries.lock().await.remove(key) {
            old.zeroize();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "T1").await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("T1"));

        store.set(ACCESS_TOKEN_KEY, "T2").await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("T2"));

        store.delete(ACCESS_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_delete_is_idempotent() {
        let store = MemoryStore::with_entries([(REFRESH_TOKEN_KEY, "R1")]);
        store.delete(REFRESH_TOKEN_KEY).await.unwrap();
        store.delete(REFRESH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryStore::with_entries([(ACCESS_TOKEN_KEY, "T1"), (REFRESH_TOKEN_KEY, "R1")]);
        store.delete(ACCESS_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("R1"));
    }
}
