use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A named time of day at which scheduled-zone items surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub id: String,
    /// 24h "HH:MM", UTC.
    pub time: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: Uuid,
    pub delivery_windows: Vec<DeliveryWindow>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PreferencesRow {
    pub user_id: Uuid,
    pub delivery_windows: Json<Vec<DeliveryWindow>>,
    pub updated_at: DateTime<Utc>,
}

impl From<PreferencesRow> for Preferences {
    fn from(row: PreferencesRow) -> Self {
        Preferences {
            user_id: row.user_id,
            delivery_windows: row.delivery_windows.0,
            updated_at: row.updated_at,
        }
    }
}
