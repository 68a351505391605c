use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::feed::ChangeFeed;
use crate::models::now_micros;
use crate::store::NotificationStore;

/// Spawns the poll producer: every `interval` it publishes rows updated since
/// its watermark. The watermark is inclusive, so a row can be published more
/// than once; subscribers dedupe.
pub fn spawn_poller(
    store: Arc<dyn NotificationStore>,
    feed: ChangeFeed,
    interval: Duration,
) -> JoinHandle<()> {
    info!("Starting change poller every {}s", interval.as_secs());
    tokio::spawn(async move {
        let mut watermark = now_micros();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.changed_since(watermark).await {
                Ok(rows) => {
                    for row in rows {
                        if row.updated_at > watermark {
                            watermark = row.updated_at;
                        }
                        feed.upserted(&row);
                    }
                }
                Err(e) => warn!("Change poll failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{fixtures::notification, Zone};
    use crate::store::MemoryStore;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_poller_publishes_new_rows() {
        let store = Arc::new(MemoryStore::new());
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();
        let handle = spawn_poller(store.clone(), feed.clone(), Duration::from_secs(5));

        // Let the first (immediate) tick pass on an empty store.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = notification(Uuid::new_v4(), Zone::Instant, now_micros());
        store.insert_notification(&n).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.id(), n.id);
        handle.abort();
    }
}
