//! Source adapters yield canonical items from arbitrary origins.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::item::CanonicalItem;

const SOURCE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source tag stamped on items that do not carry their own.
    fn name(&self) -> &str;

    async fn fetch(&self, user_id: Uuid) -> Result<Vec<CanonicalItem>, SourceError>;
}

/// Pulls a JSON array of canonical items from a URL.
pub struct HttpJsonSource {
    name: String,
    url: String,
    client: Client,
}

impl HttpJsonSource {
    pub fn new(name: String, url: String) -> anyhow::Result<Self> {
        Ok(Self {
            name,
            url,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(SOURCE_TIMEOUT_SECS))
                .build()?,
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, user_id: Uuid) -> Result<Vec<CanonicalItem>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("user_id", user_id.to_string())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let items: Vec<CanonicalItem> = response.json().await?;
        Ok(items)
    }
}

#[derive(Debug, Default)]
pub struct FanOutResult {
    /// Items from every source that answered, in configured source order.
    pub items: Vec<CanonicalItem>,
    pub failed_sources: Vec<String>,
}

/// Queries every source concurrently. A failing source is logged and skipped;
/// the others still contribute.
pub async fn fetch_all(sources: &[Arc<dyn SourceAdapter>], user_id: Uuid) -> FanOutResult {
    let mut tasks = JoinSet::new();
    for (index, source) in sources.iter().enumerate() {
        let source = Arc::clone(source);
        tasks.spawn(async move {
            let result = source.fetch(user_id).await;
            (index, source.name().to_string(), result)
        });
    }

    let mut batches: Vec<(usize, Vec<CanonicalItem>)> = Vec::with_capacity(sources.len());
    let mut result = FanOutResult::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, name, Ok(mut items))) => {
                debug!("Source '{name}' returned {} items", items.len());
                for item in &mut items {
                    if item.source.trim().is_empty() {
                        item.source = name.clone();
                    }
                }
                batches.push((index, items));
            }
            Ok((_, name, Err(e))) => {
                warn!("Source '{name}' failed: {e}");
                result.failed_sources.push(name);
            }
            Err(e) => {
                warn!("Source task aborted: {e}");
                result.failed_sources.push("unknown".to_string());
            }
        }
    }

    batches.sort_by_key(|(index, _)| *index);
    result.items = batches.into_iter().flat_map(|(_, items)| items).collect();
    result.failed_sources.sort();
    result
}
