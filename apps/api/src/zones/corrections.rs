use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::correction::Correction;
use crate::models::notification::{Notification, Zone};

/// Parameters for recording one override in the correction log.
pub struct CorrectionParams<'a> {
    pub notification_id: Uuid,
    pub original_zone: Zone,
    pub corrected_zone: Zone,
    pub raw_text_snapshot: &'a str,
    pub ai_confidence: f64,
    pub user_id: Uuid,
}

/// Builds the correction entry for an override. Persisting it is the store's
/// job and happens in the same unit of work as the zone change.
pub fn record(params: CorrectionParams<'_>, at: DateTime<Utc>) -> Correction {
    let CorrectionParams {
        notification_id,
        original_zone,
        corrected_zone,
        raw_text_snapshot,
        ai_confidence,
        user_id,
    } = params;
    Correction {
        id: Uuid::new_v4(),
        user_id,
        notification_id,
        original_zone,
        corrected_zone,
        raw_text_snapshot: raw_text_snapshot.to_string(),
        ai_confidence,
        created_at: at,
    }
}

/// Correction for overriding `before` (the record as it was) to `corrected`.
pub fn for_override(before: &Notification, corrected: Zone, at: DateTime<Utc>) -> Correction {
    record(
        CorrectionParams {
            notification_id: before.id,
            original_zone: before.effective_zone(),
            corrected_zone: corrected,
            raw_text_snapshot: &before.raw_text,
            ai_confidence: before.confidence,
            user_id: before.user_id,
        },
        at,
    )
}
