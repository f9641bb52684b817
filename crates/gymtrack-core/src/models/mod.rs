//! Data models for gymtrack entities.
//!
//! This module contains the data structures exchanged with the gym API:
//!
//! - `UserProfile`: The signed-in user, persisted between launches
//! - `Exercise`: Exercise catalog entries with media references
//! - `HistoryByDay`, `HistoryEntry`: Completed exercises grouped by day

pub mod exercise;
pub mod history;
pub mod user;

pub use exercise::Exercise;
pub use history::{HistoryByDay, HistoryEntry};
pub use user::UserProfile;

use serde::{Deserialize, Deserializer};

/// Join a base URL and a relative path with exactly one slash between them.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The API sends ids as numbers from some endpoints and strings from others.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}
