use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::classifier::ClassifierAdapter;
use crate::errors::AppError;
use crate::feed::ChangeFeed;
use crate::models::item::CanonicalItem;
use crate::models::notification::{Lifecycle, Notification, Zone};
use crate::models::now_micros;
use crate::store::{InsertOutcome, NotificationStore};

/// Body of the single-item ingestion entry point.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub raw_text: String,
    pub source: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    /// Hold the item until this instant: it is stored already snoozed.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl IngestRequest {
    pub fn into_item(self) -> (CanonicalItem, Option<DateTime<Utc>>) {
        (
            CanonicalItem {
                external_id: self.external_id,
                text: self.raw_text,
                title: self.title,
                sender: self.sender,
                source: self.source,
                timestamp: None,
            },
            self.scheduled_for,
        )
    }
}

/// Collaborators the pipeline needs, borrowed from `AppState`.
pub struct Pipeline<'a> {
    pub store: &'a dyn NotificationStore,
    pub classifier: &'a ClassifierAdapter,
    pub feed: &'a ChangeFeed,
}

/// Text handed to the classifier: title first, then body.
pub fn classification_input(title: Option<&str>, raw_text: &str) -> String {
    match title {
        Some(title) => format!("{title}\n{raw_text}"),
        None => raw_text.to_string(),
    }
}

/// Source tags are compared trimmed and lowercased.
pub fn normalize_source(source: &str) -> String {
    source.trim().to_lowercase()
}

/// Trimmed external id, `None` when blank.
pub fn normalize_external_id(id: &str) -> Option<&str> {
    let id = id.trim();
    (!id.is_empty()).then_some(id)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Classifies one item and persists it as a single row.
///
/// Does not check identity itself; callers route through `dedup::dedupe`
/// first. The store's `(user, source, external_id)` key still turns a repeat
/// into `InsertOutcome::Duplicate` rather than a second row.
pub async fn ingest_and_classify(
    pipeline: &Pipeline<'_>,
    item: CanonicalItem,
    user_id: Uuid,
    scheduled_for: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<InsertOutcome, AppError> {
    let raw_text = item.text.trim().to_string();
    if raw_text.is_empty() {
        return Err(AppError::Validation("raw_text cannot be empty".to_string()));
    }
    let source = normalize_source(&item.source);
    if source.is_empty() {
        return Err(AppError::Validation("source cannot be empty".to_string()));
    }
    let title = non_blank(item.title);
    let sender = non_blank(item.sender);
    let external_id = non_blank(item.external_id);

    let input = classification_input(title.as_deref(), &raw_text);
    let classification = pipeline.classifier.classify(&input).await;
    let classified_at = now_micros().max(now);

    let (lifecycle, user_zone) = match scheduled_for {
        Some(until) if until > now => (
            Lifecycle::Snoozed {
                until: until.trunc_subsecs(6),
            },
            Some(Zone::Scheduled),
        ),
        _ => (Lifecycle::Active, None),
    };
    let created_at = item
        .timestamp
        .filter(|t| *t <= now)
        .map(|t| t.trunc_subsecs(6))
        .unwrap_or(now);

    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        external_id,
        source,
        title,
        raw_text,
        sender,
        ai_zone: classification.zone,
        confidence: classification.confidence,
        model_id: classification.model_id,
        fallback_used: classification.fallback_used,
        user_zone,
        lifecycle,
        created_at,
        classified_at,
        updated_at: classified_at,
    };

    let outcome = pipeline.store.insert_notification(&notification).await?;
    if let InsertOutcome::Inserted(stored) = &outcome {
        info!(
            "Ingested notification {} from {} into {} (confidence {:.2}, fallback {})",
            stored.id, stored.source, stored.ai_zone, stored.confidence, stored.fallback_used
        );
        pipeline.feed.upserted(stored);
    }
    Ok(outcome)
}
