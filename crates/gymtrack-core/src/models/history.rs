use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// A completed exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HistoryEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub group: String,
    /// Time of day the exercise was registered ("HH:MM")
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// History section for one day, as returned by `GET history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HistoryByDay {
    /// Day label, e.g. "26.01.23"
    pub title: String,
    pub data: Vec<HistoryEntry>,
}

impl HistoryByDay {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Total number of completed exercises across all days.
pub fn total_entries(days: &[HistoryByDay]) -> usize {
    days.iter().map(|d| d.data.len()).sum()
}
