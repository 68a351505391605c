//! Durable store capability: per-user keyed records, conditional updates,
//! and range queries by timestamp.
//!
//! `PgStore` is the production backend; `MemoryStore` carries the same
//! contract for tests and `STORE_BACKEND=memory`.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::correction::Correction;
use crate::models::notification::{Notification, UnknownZone, Zone};
use crate::models::preferences::Preferences;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] UnknownZone),

    #[error("Write rejected: {0}")]
    WriteFailed(String),
}

/// Result of an insert keyed on `(user, source, external_id)`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Notification),
    /// A row with the same key already existed; it is returned untouched.
    Duplicate(Notification),
}

impl InsertOutcome {
    pub fn notification(&self) -> &Notification {
        match self {
            InsertOutcome::Inserted(n) | InsertOutcome::Duplicate(n) => n,
        }
    }
}

/// Zone change plus the correction committed with it.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideOutcome {
    pub notification: Notification,
    pub correction: Correction,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts `notification` unless a row with the same
    /// `(user_id, source, external_id)` exists.
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, StoreError>;

    async fn get_notification(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError>;

    async fn find_by_external_id(
        &self,
        user_id: Uuid,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Notification>, StoreError>;

    /// `(source, external_id)` of every row the user has with an external id.
    async fn known_external_ids(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<(String, String)>, StoreError>;

    /// Writes `next` only if the stored row still has `expected_updated_at`.
    /// Returns `false` when the row changed underneath or no longer exists.
    async fn update_if_unchanged(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &Notification,
    ) -> Result<bool, StoreError>;

    /// Sets `user_zone` and appends the matching correction as one unit.
    /// Concurrent overrides of the same id serialize. `None` if the id is unknown.
    async fn override_zone(
        &self,
        user_id: Uuid,
        id: Uuid,
        zone: Zone,
        at: DateTime<Utc>,
    ) -> Result<Option<OverrideOutcome>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// Every non-dismissed row, newest first.
    async fn list_undismissed(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError>;

    /// Dismissed or snoozed rows, most recently updated first.
    async fn list_handled(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Rows created at or after `since` (all rows when `None`).
    async fn notifications_since(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn count_corrections(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError>;

    /// Newest first.
    async fn list_corrections(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Correction>, StoreError>;

    /// Rows of any user whose `updated_at` is at or after `since`, oldest first.
    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, StoreError>;

    async fn get_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, StoreError>;

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), StoreError>;
}
