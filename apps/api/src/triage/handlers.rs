//! Axum route handlers for ingestion.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::notification::Notification;
use crate::models::now_micros;
use crate::state::AppState;
use crate::store::InsertOutcome;
use crate::triage::bulk::FeedReport;
use crate::triage::pipeline::{
    ingest_and_classify, normalize_external_id, normalize_source, IngestRequest,
};
use crate::zones::service::ZoneListing;

#[derive(Debug, Deserialize)]
pub struct FeedRequest {
    #[serde(default, rename = "cachedIds", alias = "cached_ids")]
    pub cached_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub notifications: ZoneListing,
    pub report: FeedReport,
}

/// POST /api/v1/notifications
///
/// Returns 201 with the new row, or 200 with the existing row when the
/// external id is already known for this user and source.
pub async fn handle_ingest(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(request): AppJson<IngestRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let (item, scheduled_for) = request.into_item();

    // A known external id costs a lookup, never a classification.
    if let Some(external_id) = item.external_id.as_deref().and_then(normalize_external_id) {
        let existing = state
            .store
            .find_by_external_id(user_id, &normalize_source(&item.source), external_id)
            .await?;
        if let Some(existing) = existing {
            return Ok((StatusCode::OK, Json(existing)));
        }
    }

    let outcome =
        ingest_and_classify(&state.pipeline(), item, user_id, scheduled_for, now_micros()).await?;
    match outcome {
        InsertOutcome::Inserted(n) => Ok((StatusCode::CREATED, Json(n))),
        InsertOutcome::Duplicate(n) => Ok((StatusCode::OK, Json(n))),
    }
}

/// POST /api/v1/feed
///
/// Pulls every configured source, ingests what is new, and returns the
/// caller's full zone-grouped listing.
pub async fn handle_feed(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(request): AppJson<FeedRequest>,
) -> Result<Json<FeedResponse>, AppError> {
    let report = state.bulk_feed().run(user_id, &request.cached_ids).await?;
    let notifications = state.zones().active_listing(user_id).await?;
    debug!(
        "Feed for {user_id}: {} ingested, {} active",
        report.ingested,
        notifications.len()
    );
    Ok(Json(FeedResponse {
        notifications,
        report,
    }))
}
