use serde::{Deserialize, Serialize};

use super::{deserialize_id, join_url};

/// An exercise from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Exercise {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub series: u32,
    pub repetitions: u32,
    /// Muscle group, e.g. "costas"
    pub group: String,
    /// Demo animation file name
    #[serde(default)]
    pub demo: String,
    /// Thumbnail file name
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Exercise {
    pub fn demo_url(&self, base_url: &str) -> String {
        join_url(base_url, &format!("exercise/demo/{}", self.demo))
    }

    pub fn thumb_url(&self, base_url: &str) -> String {
        join_url(base_url, &format!("exercise/thumb/{}", self.thumb))
    }

    /// Short "3 x 12" style summary.
    pub fn prescription(&self) -> String {
        format!("{} x {}", self.series, self.repetitions)
    }
}
