use std::collections::{HashMap, HashSet};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::correction::Correction;
use crate::models::notification::{Notification, Zone};
use crate::models::preferences::Preferences;
use crate::store::{InsertOutcome, NotificationStore, OverrideOutcome, StoreError};
use crate::zones::{corrections, state_machine};

#[derive(Default)]
struct Tables {
    notifications: HashMap<Uuid, Notification>,
    corrections: Vec<Correction>,
    preferences: HashMap<Uuid, Preferences>,
}

/// In-process store. One lock guards all tables, so an override and its
/// correction are applied together or not at all.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    reject_corrections: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following correction write fail.
    #[cfg(test)]
    pub fn reject_correction_writes(&self) {
        self.reject_corrections.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_correction_write(&self) -> Result<(), StoreError> {
        if self.reject_corrections.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("correction log unavailable".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_correction_write(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn same_key(a: &Notification, b: &Notification) -> bool {
    a.user_id == b.user_id
        && a.source == b.source
        && a.external_id.is_some()
        && a.external_id == b.external_id
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .notifications
            .values()
            .find(|n| same_key(n, notification))
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(InsertOutcome::Inserted(notification.clone()))
    }

    async fn get_notification(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .get(&id)
            .filter(|n| n.user_id == user_id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        user_id: Uuid,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .find(|n| {
                n.user_id == user_id
                    && n.source == source
                    && n.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn known_external_ids(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<(String, String)>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .filter_map(|n| Some((n.source.clone(), n.external_id.clone()?)))
            .collect())
    }

    async fn update_if_unchanged(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &Notification,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.notifications.get_mut(&next.id) {
            Some(current)
                if current.user_id == next.user_id
                    && current.updated_at == expected_updated_at =>
            {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn override_zone(
        &self,
        user_id: Uuid,
        id: Uuid,
        zone: Zone,
        at: DateTime<Utc>,
    ) -> Result<Option<OverrideOutcome>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables
            .notifications
            .get(&id)
            .filter(|n| n.user_id == user_id)
            .cloned()
        else {
            return Ok(None);
        };

        let (next, _) = state_machine::apply_override(&current, zone, at);
        let correction = corrections::for_override(&current, zone, at);
        self.check_correction_write()?;

        tables.corrections.push(correction.clone());
        tables.notifications.insert(id, next.clone());
        Ok(Some(OverrideOutcome {
            notification: next,
            correction,
        }))
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.notifications.get(&id) {
            Some(n) if n.user_id == user_id => {
                tables.notifications.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_undismissed(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_dismissed())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_handled(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (n.is_dismissed() || n.is_snoozed()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn notifications_since(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .filter(|n| since.map_or(true, |s| n.created_at >= s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn count_corrections(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .corrections
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| since.map_or(true, |s| c.created_at >= s))
            .count() as u64)
    }

    async fn list_corrections(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Correction>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .corrections
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.updated_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(rows)
    }

    async fn get_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.preferences.get(&user_id).cloned())
    }

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .preferences
            .insert(preferences.user_id, preferences.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::fixtures::notification;
    use crate::models::now_micros;

    #[tokio::test]
    async fn test_insert_dedupes_on_user_source_external_id() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let mut first = notification(user, Zone::Batch, now_micros());
        first.source = "mail".to_string();
        first.external_id = Some("msg-1".to_string());
        let mut second = first.clone();
        second.id = Uuid::new_v4();

        assert!(matches!(
            store.insert_notification(&first).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        let outcome = store.insert_notification(&second).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate(first.clone()));

        // Same external id from another source is a different key.
        let mut other_source = second.clone();
        other_source.source = "chat".to_string();
        assert!(matches!(
            store.insert_notification(&other_source).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }

    #[tokio::test]
    async fn test_rows_without_external_id_never_collide() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let a = notification(user, Zone::Instant, now_micros());
        let b = notification(user, Zone::Instant, now_micros());
        store.insert_notification(&a).await.unwrap();
        store.insert_notification(&b).await.unwrap();
        assert_eq!(store.list_undismissed(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_if_unchanged_rejects_stale_write() {
        let store = MemoryStore::new();
        let n = notification(Uuid::new_v4(), Zone::Batch, now_micros());
        store.insert_notification(&n).await.unwrap();

        let mut next = n.clone();
        next.updated_at = n.updated_at + chrono::Duration::seconds(1);
        assert!(store.update_if_unchanged(n.updated_at, &next).await.unwrap());
        // Second writer still holds the old version.
        assert!(!store.update_if_unchanged(n.updated_at, &next).await.unwrap());
    }

    #[tokio::test]
    async fn test_override_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let n = notification(Uuid::new_v4(), Zone::Batch, now_micros());
        store.insert_notification(&n).await.unwrap();
        let outcome = store
            .override_zone(Uuid::new_v4(), n.id, Zone::Instant, now_micros())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(store.count_corrections(n.user_id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_correction_write_leaves_notification_untouched() {
        let store = MemoryStore::new();
        let n = notification(Uuid::new_v4(), Zone::Batch, now_micros());
        store.insert_notification(&n).await.unwrap();
        store.reject_correction_writes();

        let result = store
            .override_zone(n.user_id, n.id, Zone::Instant, now_micros())
            .await;
        assert!(result.is_err());
        let stored = store.get_notification(n.user_id, n.id).await.unwrap().unwrap();
        assert_eq!(stored, n);
        assert_eq!(store.count_corrections(n.user_id, None).await.unwrap(), 0);
    }
}
