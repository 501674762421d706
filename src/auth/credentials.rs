//! Credential storage for the dashboard session.
//!
//! The session lives in a process-external key/value medium under three
//! fixed keys: the access token, the refresh token, and the cached user
//! profile. Writing a new token pair overwrites the old one; the three keys
//! are always cleared together on logout or renewal failure.
//!
//! `KeyringStore` keeps the values in the OS keychain; `MemoryStore` backs
//! tests and headless environments.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;

/// Keyring service name for persisted credentials
const SERVICE_NAME: &str = "tilldesk";

/// Store key for the short-lived bearer credential
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key for the long-lived renewal credential
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key for the cached user profile blob
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential backend error: {0}")]
    Backend(String),
}

/// Persisted key/value storage for session credentials.
///
/// The transport reads the access token from here on every outgoing call;
/// the renewal coordinator is the only writer.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites any existing value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Idempotent; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory credential store.
///
/// Not persistent; values are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))?;
        data.remove(key);
        Ok(())
    }
}

/// OS keychain-backed credential store.
///
/// Uses the platform keyring service (Keychain on macOS, Secret Service on
/// Linux, Credential Manager on Windows), one entry per store key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// A store under a custom service name, so side-by-side deployments
    /// don't clobber each other's sessions.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key)
            .map_err(|e| StoreError::Backend(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("keyring error: {}", e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        entry
            .set_password(value)
            .map_err(|e| StoreError::Backend(format!("failed to store credential: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Backend(format!(
                "failed to delete credential: {}",
                e
            ))),
        }
    }
}
