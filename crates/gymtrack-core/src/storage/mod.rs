//! Local persistence for the signed-in session.
//!
//! This module provides:
//! - `KeyValueStore`: Durable string-keyed storage, with file, keyring and
//!   in-memory backends
//! - `SessionStorage`: Reads and writes the user profile and bearer token
//!
//! The profile and token live under separate keys. Nothing here keeps the
//! two in step; the session manager does that.

pub mod kv;
pub mod session_storage;

pub use kv::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StoreError};
pub use session_storage::{SessionStorage, StorageError, TOKEN_KEY, USER_KEY};
