use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-agnostic message as yielded by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    #[serde(default)]
    pub external_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub source: String,
    /// When the origin received the message, if it says.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
