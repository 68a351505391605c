use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::notification::{UnknownZone, Zone};

/// Immutable record of a manual zone override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub original_zone: Zone,
    pub corrected_zone: Zone,
    /// Text as it was when the override happened.
    pub raw_text_snapshot: String,
    pub ai_confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CorrectionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub original_zone: String,
    pub corrected_zone: String,
    pub raw_text_snapshot: String,
    pub ai_confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CorrectionRow> for Correction {
    type Error = UnknownZone;

    fn try_from(row: CorrectionRow) -> Result<Self, Self::Error> {
        Ok(Correction {
            id: row.id,
            user_id: row.user_id,
            notification_id: row.notification_id,
            original_zone: row.original_zone.parse()?,
            corrected_zone: row.corrected_zone.parse()?,
            raw_text_snapshot: row.raw_text_snapshot,
            ai_confidence: row.ai_confidence,
            created_at: row.created_at,
        })
    }
}
