use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Attention zone a notification is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Instant,
    Scheduled,
    Batch,
}

impl Zone {
    /// Fixed label order handed to the classifier.
    pub const ALL: [Zone; 3] = [Zone::Instant, Zone::Scheduled, Zone::Batch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Instant => "instant",
            Zone::Scheduled => "scheduled",
            Zone::Batch => "batch",
        }
    }

    /// Maps a classifier label onto a zone, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Zone> {
        let label = label.trim();
        Zone::ALL
            .into_iter()
            .find(|z| z.as_str().eq_ignore_ascii_case(label))
    }

    pub fn is_noise(&self) -> bool {
        !matches!(self, Zone::Instant)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown zone '{0}'")]
pub struct UnknownZone(pub String);

impl FromStr for Zone {
    type Err = UnknownZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::from_label(s).ok_or_else(|| UnknownZone(s.to_string()))
    }
}

/// Where a notification sits in its lifecycle. Deletion is a hard removal,
/// so there is no `Deleted` variant: a deleted notification has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Dismissed,
    Snoozed { until: DateTime<Utc> },
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Dismissed => "dismissed",
            Lifecycle::Snoozed { .. } => "snoozed",
        }
    }
}

/// A message under triage, exclusively owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_id: Option<String>,
    pub source: String,
    pub title: Option<String>,
    pub raw_text: String,
    pub sender: Option<String>,
    /// The classifier's decision. Never rewritten; overrides go to `user_zone`.
    pub ai_zone: Zone,
    pub confidence: f64,
    pub model_id: String,
    pub fallback_used: bool,
    pub user_zone: Option<Zone>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub classified_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn effective_zone(&self) -> Zone {
        self.user_zone.unwrap_or(self.ai_zone)
    }

    pub fn is_dismissed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Dismissed)
    }

    pub fn is_snoozed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Snoozed { .. })
    }

    pub fn snoozed_until(&self) -> Option<DateTime<Utc>> {
        match self.lifecycle {
            Lifecycle::Snoozed { until } => Some(until),
            _ => None,
        }
    }

    pub fn word_count(&self) -> usize {
        self.raw_text.split_whitespace().count()
    }
}

/// Flat row layout of the `notifications` table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_id: Option<String>,
    pub source: String,
    pub title: Option<String>,
    pub raw_text: String,
    pub sender: Option<String>,
    pub ai_zone: String,
    pub confidence: f64,
    pub model_id: String,
    pub fallback_used: bool,
    pub user_zone: Option<String>,
    pub is_dismissed: bool,
    pub is_snoozed: bool,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub classified_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = UnknownZone;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let lifecycle = match (row.is_dismissed, row.is_snoozed, row.snoozed_until) {
            (true, _, _) => Lifecycle::Dismissed,
            (false, true, Some(until)) => Lifecycle::Snoozed { until },
            _ => Lifecycle::Active,
        };
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            external_id: row.external_id,
            source: row.source,
            title: row.title,
            raw_text: row.raw_text,
            sender: row.sender,
            ai_zone: row.ai_zone.parse()?,
            confidence: row.confidence,
            model_id: row.model_id,
            fallback_used: row.fallback_used,
            user_zone: row.user_zone.as_deref().map(str::parse).transpose()?,
            lifecycle,
            created_at: row.created_at,
            classified_at: row.classified_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// An active, confidently classified notification with no override.
    pub fn notification(user_id: Uuid, zone: Zone, at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            external_id: None,
            source: "manual".to_string(),
            title: None,
            raw_text: "Reminder about tomorrow".to_string(),
            sender: None,
            ai_zone: zone,
            confidence: 0.9,
            model_id: "test-model".to_string(),
            fallback_used: false,
            user_zone: None,
            lifecycle: Lifecycle::Active,
            created_at: at,
            classified_at: at,
            updated_at: at,
        }
    }
}
