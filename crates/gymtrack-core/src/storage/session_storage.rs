use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::models::UserProfile;

use super::{KeyValueStore, StoreError};

/// Storage key for the serialized user profile
pub const USER_KEY: &str = "@gymtrack:user";

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "@gymtrack:token";

/// Failure reading or writing the persisted session.
///
/// `Read` covers both an unreadable store and a value that is present but
/// cannot be decoded. A missing value is not an error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {key}: {reason}")]
    Read { key: &'static str, reason: String },

    #[error("Failed to write {key}: {source}")]
    Write {
        key: &'static str,
        #[source]
        source: StoreError,
    },
}

impl StorageError {
    fn read(key: &'static str, reason: impl ToString) -> Self {
        StorageError::Read {
            key,
            reason: reason.to_string(),
        }
    }
}

/// Persists the user profile and bearer token in a key-value store.
///
/// Clone is cheap; clones share the same backend.
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    // ===== User =====

    pub fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let contents = serde_json::to_string(user).map_err(|e| StorageError::Write {
            key: USER_KEY,
            source: StoreError::Io(e.into()),
        })?;
        self.write(USER_KEY, &contents)
    }

    pub fn get_user(&self) -> Result<Option<UserProfile>, StorageError> {
        match self.read(USER_KEY)? {
            Some(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| StorageError::read(USER_KEY, e)),
            None => Ok(None),
        }
    }

    pub fn remove_user(&self) -> Result<(), StorageError> {
        self.delete(USER_KEY)
    }

    // ===== Token =====

    pub fn save_token(&self, token: &str) -> Result<(), StorageError> {
        self.write(TOKEN_KEY, token)
    }

    pub fn get_token(&self) -> Result<Option<String>, StorageError> {
        match self.read(TOKEN_KEY)? {
            Some(token) if token.trim().is_empty() => {
                Err(StorageError::read(TOKEN_KEY, "stored token is empty"))
            }
            other => Ok(other),
        }
    }

    pub fn remove_token(&self) -> Result<(), StorageError> {
        self.delete(TOKEN_KEY)
    }

    fn read(&self, key: &'static str) -> Result<Option<String>, StorageError> {
        self.store.get(key).map_err(|e| StorageError::read(key, e))
    }

    fn write(&self, key: &'static str, value: &str) -> Result<(), StorageError> {
        self.store
            .set(key, value)
            .map_err(|source| StorageError::Write { key, source })?;
        debug!(key = key, "Saved session record");
        Ok(())
    }

    fn delete(&self, key: &'static str) -> Result<(), StorageError> {
        self.store
            .remove(key)
            .map_err(|source| StorageError::Write { key, source })
    }
}
