use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::feed::ChangeFeed;
use crate::models::notification::{Notification, Zone};
use crate::store::{NotificationStore, OverrideOutcome};
use crate::zones::state_machine::{self, Transition};

/// Attempts before a transition gives up on a row that keeps changing.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Non-dismissed notifications grouped by effective zone, newest first.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ZoneListing {
    pub instant: Vec<Notification>,
    pub scheduled: Vec<Notification>,
    pub batch: Vec<Notification>,
}

impl ZoneListing {
    pub fn len(&self) -> usize {
        self.instant.len() + self.scheduled.len() + self.batch.len()
    }
}

pub fn group_by_zone(notifications: Vec<Notification>) -> ZoneListing {
    let mut listing = ZoneListing::default();
    for n in notifications {
        match n.effective_zone() {
            Zone::Instant => listing.instant.push(n),
            Zone::Scheduled => listing.scheduled.push(n),
            Zone::Batch => listing.batch.push(n),
        }
    }
    listing
}

pub struct ZoneService<'a> {
    pub store: &'a dyn NotificationStore,
    pub feed: &'a ChangeFeed,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Notification {id} not found"))
}

impl ZoneService<'_> {
    /// Applies a lifecycle transition with compare-and-set on `updated_at`,
    /// rereading and retrying when a concurrent writer got there first.
    pub async fn transition(
        &self,
        user_id: Uuid,
        id: Uuid,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Notification, AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .store
                .get_notification(user_id, id)
                .await?
                .ok_or_else(|| not_found(id))?;

            // Keep updated_at strictly increasing so the CAS sees every write.
            let at = if now > current.updated_at {
                now
            } else {
                current.updated_at + chrono::Duration::microseconds(1)
            };
            let Some(next) = state_machine::apply(&current, transition, at)? else {
                return Ok(current);
            };

            if self.store.update_if_unchanged(current.updated_at, &next).await? {
                info!(
                    "Notification {id}: {} -> {}",
                    current.lifecycle.name(),
                    next.lifecycle.name()
                );
                self.feed.upserted(&next);
                return Ok(next);
            }
            warn!("Notification {id} changed during {}, retrying", transition.name());
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "notification {id} kept changing during {}",
            transition.name()
        )))
    }

    /// Moves the notification to `zone` and logs the correction in the same
    /// unit of work.
    pub async fn override_zone(
        &self,
        user_id: Uuid,
        id: Uuid,
        zone: Zone,
        now: DateTime<Utc>,
    ) -> Result<OverrideOutcome, AppError> {
        let outcome = self
            .store
            .override_zone(user_id, id, zone, now)
            .await?
            .ok_or_else(|| not_found(id))?;
        info!(
            "Notification {id} moved {} -> {}",
            outcome.correction.original_zone, outcome.correction.corrected_zone
        );
        self.feed.upserted(&outcome.notification);
        Ok(outcome)
    }

    /// Hard delete. Deleting an unknown or already deleted id succeeds.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if self.store.delete_notification(user_id, id).await? {
            info!("Notification {id} deleted");
            self.feed.deleted(user_id, id);
        }
        Ok(())
    }

    pub async fn active_listing(&self, user_id: Uuid) -> Result<ZoneListing, AppError> {
        let rows = self.store.list_undismissed(user_id).await?;
        Ok(group_by_zone(rows))
    }

    pub async fn handled(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(self.store.list_handled(user_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::fixtures::notification;
    use crate::models::notification::Lifecycle;
    use crate::models::now_micros;
    use crate::store::MemoryStore;
    use chrono::Duration;

    struct Harness {
        store: MemoryStore,
        feed: ChangeFeed,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                feed: ChangeFeed::new(64),
            }
        }

        fn service(&self) -> ZoneService<'_> {
            ZoneService {
                store: &self.store,
                feed: &self.feed,
            }
        }

        async fn seed(&self, zone: Zone) -> Notification {
            let n = notification(Uuid::new_v4(), zone, now_micros() - Duration::minutes(5));
            self.store.insert_notification(&n).await.unwrap();
            n
        }
    }

    #[tokio::test]
    async fn test_snooze_instant_until_later() {
        let h = Harness::new();
        let n = h.seed(Zone::Instant).await;
        let now = now_micros();
        let until = now + Duration::hours(4);

        let snoozed = h
            .service()
            .transition(n.user_id, n.id, Transition::Snooze { until }, now)
            .await
            .unwrap();
        assert!(snoozed.is_snoozed());
        assert_eq!(snoozed.snoozed_until(), Some(until));
        assert_eq!(snoozed.user_zone, Some(Zone::Scheduled));

        let listing = h.service().active_listing(n.user_id).await.unwrap();
        assert_eq!(listing.scheduled.len(), 1);
        assert!(listing.instant.is_empty());
    }

    #[tokio::test]
    async fn test_move_batch_to_instant_logs_one_correction() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;

        let outcome = h
            .service()
            .override_zone(n.user_id, n.id, Zone::Instant, now_micros())
            .await
            .unwrap();
        assert_eq!(outcome.correction.original_zone, Zone::Batch);
        assert_eq!(outcome.correction.corrected_zone, Zone::Instant);
        assert_eq!(h.store.count_corrections(n.user_id, None).await.unwrap(), 1);

        let listing = h.service().active_listing(n.user_id).await.unwrap();
        assert_eq!(listing.instant.len(), 1);
        assert_eq!(listing.instant[0].ai_zone, Zone::Batch);
    }

    #[tokio::test]
    async fn test_successive_moves_chain_original_zones() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let svc = h.service();
        svc.override_zone(n.user_id, n.id, Zone::Scheduled, now_micros())
            .await
            .unwrap();
        let second = svc
            .override_zone(n.user_id, n.id, Zone::Instant, now_micros())
            .await
            .unwrap();
        assert_eq!(second.correction.original_zone, Zone::Scheduled);
        assert_eq!(h.store.count_corrections(n.user_id, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_moves_never_record_stale_original() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let svc = h.service();
        let (a, b) = tokio::join!(
            svc.override_zone(n.user_id, n.id, Zone::Instant, now_micros()),
            svc.override_zone(n.user_id, n.id, Zone::Scheduled, now_micros()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        // Whichever committed second must have seen the first one's zone.
        let originals = [a.correction.original_zone, b.correction.original_zone];
        assert!(originals.contains(&Zone::Batch));
        assert!(
            originals.contains(&a.correction.corrected_zone)
                || originals.contains(&b.correction.corrected_zone)
        );
    }

    #[tokio::test]
    async fn test_failed_correction_write_fails_the_move() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        h.store.reject_correction_writes();
        let err = h
            .service()
            .override_zone(n.user_id, n.id, Zone::Instant, now_micros())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        let stored = h.store.get_notification(n.user_id, n.id).await.unwrap().unwrap();
        assert_eq!(stored.effective_zone(), Zone::Batch);
    }

    #[tokio::test]
    async fn test_restore_dismissed_keeps_zone_and_is_idempotent() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let svc = h.service();
        svc.override_zone(n.user_id, n.id, Zone::Scheduled, now_micros())
            .await
            .unwrap();
        svc.transition(n.user_id, n.id, Transition::Dismiss, now_micros())
            .await
            .unwrap();

        let restored = svc
            .transition(n.user_id, n.id, Transition::Restore, now_micros())
            .await
            .unwrap();
        assert_eq!(restored.lifecycle, Lifecycle::Active);
        assert_eq!(restored.user_zone, Some(Zone::Scheduled));

        let again = svc
            .transition(n.user_id, n.id, Transition::Restore, now_micros())
            .await
            .unwrap();
        assert_eq!(again, restored);
    }

    #[tokio::test]
    async fn test_dismissed_items_leave_active_listing_for_handled() {
        let h = Harness::new();
        let keep = h.seed(Zone::Instant).await;
        let user = keep.user_id;
        let mut gone = notification(user, Zone::Batch, now_micros());
        gone.lifecycle = Lifecycle::Active;
        h.store.insert_notification(&gone).await.unwrap();

        let svc = h.service();
        svc.transition(user, gone.id, Transition::Dismiss, now_micros())
            .await
            .unwrap();

        let listing = svc.active_listing(user).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.instant[0].id, keep.id);

        let handled = svc.handled(user, 50).await.unwrap();
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].id, gone.id);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_blocks_later_moves() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let svc = h.service();
        svc.delete(n.user_id, n.id).await.unwrap();
        svc.delete(n.user_id, n.id).await.unwrap();

        let err = svc
            .override_zone(n.user_id, n.id, Zone::Instant, now_micros())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = svc
            .transition(n.user_id, n.id, Transition::Restore, now_micros())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_users_cannot_touch_notification() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let err = h
            .service()
            .transition(Uuid::new_v4(), n.id, Transition::Dismiss, now_micros())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mutations_publish_change_events() {
        let h = Harness::new();
        let n = h.seed(Zone::Batch).await;
        let mut rx = h.feed.subscribe();
        let svc = h.service();
        svc.transition(n.user_id, n.id, Transition::Dismiss, now_micros())
            .await
            .unwrap();
        svc.delete(n.user_id, n.id).await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), crate::feed::ChangeEvent::Upserted { .. }));
        assert!(matches!(rx.recv().await.unwrap(), crate::feed::ChangeEvent::Deleted { .. }));
    }
}
