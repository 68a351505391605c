use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::correction::{Correction, CorrectionRow};
use crate::models::notification::{Notification, NotificationRow, Zone};
use crate::models::preferences::{Preferences, PreferencesRow};
use crate::store::{InsertOutcome, NotificationStore, OverrideOutcome, StoreError};
use crate::zones::{corrections, state_machine};

/// Postgres-backed store over the `notifications`, `corrections` and
/// `preferences` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_notifications(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, StoreError> {
    rows.into_iter()
        .map(|r| Notification::try_from(r).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, StoreError> {
        let n = notification;
        let inserted: Option<NotificationRow> = sqlx::query_as(
            r#"
            INSERT INTO notifications
                (id, user_id, external_id, source, title, raw_text, sender,
                 ai_zone, confidence, model_id, fallback_used, user_zone,
                 is_dismissed, is_snoozed, snoozed_until,
                 created_at, classified_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (user_id, source, external_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(&n.external_id)
        .bind(&n.source)
        .bind(&n.title)
        .bind(&n.raw_text)
        .bind(&n.sender)
        .bind(n.ai_zone.as_str())
        .bind(n.confidence)
        .bind(&n.model_id)
        .bind(n.fallback_used)
        .bind(n.user_zone.map(|z| z.as_str()))
        .bind(n.is_dismissed())
        .bind(n.is_snoozed())
        .bind(n.snoozed_until())
        .bind(n.created_at)
        .bind(n.classified_at)
        .bind(n.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.try_into()?));
        }

        debug!(
            "Notification from {} with external id {:?} already stored",
            n.source, n.external_id
        );
        let existing: NotificationRow = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 AND source = $2 AND external_id = $3",
        )
        .bind(n.user_id)
        .bind(&n.source)
        .bind(&n.external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(InsertOutcome::Duplicate(existing.try_into()?))
    }

    async fn get_notification(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> =
            sqlx::query_as("SELECT * FROM notifications WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Notification::try_from).transpose()?)
    }

    async fn find_by_external_id(
        &self,
        user_id: Uuid,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 AND source = $2 AND external_id = $3",
        )
        .bind(user_id)
        .bind(source)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Notification::try_from).transpose()?)
    }

    async fn known_external_ids(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<(String, String)>, StoreError> {
        let ids: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT source, external_id FROM notifications
            WHERE user_id = $1 AND external_id IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn update_if_unchanged(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &Notification,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET user_zone = $1, is_dismissed = $2, is_snoozed = $3,
                snoozed_until = $4, updated_at = $5
            WHERE id = $6 AND user_id = $7 AND updated_at = $8
            "#,
        )
        .bind(next.user_zone.map(|z| z.as_str()))
        .bind(next.is_dismissed())
        .bind(next.is_snoozed())
        .bind(next.snoozed_until())
        .bind(next.updated_at)
        .bind(next.id)
        .bind(next.user_id)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn override_zone(
        &self,
        user_id: Uuid,
        id: Uuid,
        zone: Zone,
        at: DateTime<Utc>,
    ) -> Result<Option<OverrideOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent override waits here and then sees our zone
        // as its original.
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let current = Notification::try_from(row)?;

        let (next, _) = state_machine::apply_override(&current, zone, at);
        let correction = corrections::for_override(&current, zone, at);

        sqlx::query("UPDATE notifications SET user_zone = $1, updated_at = $2 WHERE id = $3")
            .bind(zone.as_str())
            .bind(next.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO corrections
                (id, user_id, notification_id, original_zone, corrected_zone,
                 raw_text_snapshot, ai_confidence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(correction.id)
        .bind(correction.user_id)
        .bind(correction.notification_id)
        .bind(correction.original_zone.as_str())
        .bind(correction.corrected_zone.as_str())
        .bind(&correction.raw_text_snapshot)
        .bind(correction.ai_confidence)
        .bind(correction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(OverrideOutcome {
            notification: next,
            correction,
        }))
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_undismissed(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND NOT is_dismissed
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_notifications(rows)
    }

    async fn list_handled(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (is_dismissed OR is_snoozed)
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        into_notifications(rows)
    }

    async fn notifications_since(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        into_notifications(rows)
    }

    async fn count_corrections(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM corrections
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_corrections(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Correction>, StoreError> {
        let rows: Vec<CorrectionRow> = sqlx::query_as(
            "SELECT * FROM corrections WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Correction::try_from(r).map_err(StoreError::from))
            .collect()
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE updated_at >= $1 ORDER BY updated_at ASC LIMIT 500",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        into_notifications(rows)
    }

    async fn get_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, StoreError> {
        let row: Option<PreferencesRow> =
            sqlx::query_as("SELECT * FROM preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Preferences::from))
    }

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO preferences (user_id, delivery_windows, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET delivery_windows = EXCLUDED.delivery_windows,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(preferences.user_id)
        .bind(Json(preferences.delivery_windows.clone()))
        .bind(preferences.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
