use std::sync::Arc;

use crate::classifier::ClassifierAdapter;
use crate::config::Config;
use crate::feed::ChangeFeed;
use crate::store::NotificationStore;
use crate::triage::bulk::BulkFeed;
use crate::triage::pipeline::Pipeline;
use crate::triage::sources::SourceAdapter;
use crate::zones::service::ZoneService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, in-memory under `STORE_BACKEND=memory`.
    pub store: Arc<dyn NotificationStore>,
    pub classifier: ClassifierAdapter,
    /// Adapters queried by the bulk feed, in the order configured.
    pub sources: Arc<Vec<Arc<dyn SourceAdapter>>>,
    pub feed: ChangeFeed,
    pub config: Config,
}

impl AppState {
    pub fn zones(&self) -> ZoneService<'_> {
        ZoneService {
            store: self.store.as_ref(),
            feed: &self.feed,
        }
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            store: self.store.as_ref(),
            classifier: &self.classifier,
            feed: &self.feed,
        }
    }

    pub fn bulk_feed(&self) -> BulkFeed {
        BulkFeed {
            store: Arc::clone(&self.store),
            classifier: self.classifier.clone(),
            feed: self.feed.clone(),
            sources: Arc::clone(&self.sources),
            concurrency: self.config.classify_concurrency,
        }
    }
}
