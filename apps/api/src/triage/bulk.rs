//! Bulk feed: fan out to every source, drop known ids, then classify and
//! persist the rest with bounded parallelism.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use crate::classifier::ClassifierAdapter;
use crate::errors::AppError;
use crate::feed::ChangeFeed;
use crate::models::now_micros;
use crate::store::{InsertOutcome, NotificationStore};
use crate::triage::dedup::{dedupe, KnownIds};
use crate::triage::pipeline::{ingest_and_classify, Pipeline};
use crate::triage::sources::{fetch_all, SourceAdapter};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedReport {
    pub fetched: usize,
    pub ingested: usize,
    /// Dropped by dedup or already present in the store.
    pub skipped: usize,
    /// Items whose classification or write failed.
    pub failed: usize,
    pub failed_sources: Vec<String>,
}

pub struct BulkFeed {
    pub store: Arc<dyn NotificationStore>,
    pub classifier: ClassifierAdapter,
    pub feed: ChangeFeed,
    pub sources: Arc<Vec<Arc<dyn SourceAdapter>>>,
    pub concurrency: usize,
}

impl BulkFeed {
    /// Runs one feed pass for `user_id`. `cached_ids` are external ids the
    /// caller already holds; they are skipped along with ids the store knows.
    pub async fn run(&self, user_id: Uuid, cached_ids: &[String]) -> Result<FeedReport, AppError> {
        let fanned = fetch_all(&self.sources, user_id).await;
        let fetched = fanned.items.len();

        let known = KnownIds::new(self.store.known_external_ids(user_id).await?, cached_ids);
        let fresh = dedupe(fanned.items, &known);
        let mut report = FeedReport {
            fetched,
            skipped: fetched - fresh.len(),
            failed_sources: fanned.failed_sources,
            ..FeedReport::default()
        };

        let permits = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for item in fresh {
            let permits = Arc::clone(&permits);
            let store = Arc::clone(&self.store);
            let classifier = self.classifier.clone();
            let feed = self.feed.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("classification pool closed: {e}"))
                })?;
                let pipeline = Pipeline {
                    store: store.as_ref(),
                    classifier: &classifier,
                    feed: &feed,
                };
                ingest_and_classify(&pipeline, item, user_id, None, now_micros()).await
            });
        }

        // Each item stands alone: one failure does not touch the others.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(InsertOutcome::Inserted(_))) => report.ingested += 1,
                Ok(Ok(InsertOutcome::Duplicate(_))) => report.skipped += 1,
                Ok(Err(e)) => {
                    error!("Feed item for user {user_id} failed: {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("Feed item task aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "Feed for user {user_id}: fetched {}, ingested {}, skipped {}, failed {}",
            report.fetched, report.ingested, report.skipped, report.failed
        );
        Ok(report)
    }
}
