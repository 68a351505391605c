use axum::{
    extract::State,
    Json,
};
use chrono::Duration;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::AppQuery;
use crate::models::now_micros;
use crate::state::AppState;
use crate::telemetry::stats::{compute_stats, Stats, StatsRange};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub range: StatsRange,
}

/// GET /api/v1/stats?range=24H|7D|ALL
pub async fn handle_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<StatsQuery>,
) -> Result<Json<Stats>, AppError> {
    let now = now_micros();
    let since = query.range.since(now);

    let in_range = state.store.notifications_since(user_id, since).await?;
    let corrections = state.store.count_corrections(user_id, since).await?;

    // Every range is at least a day wide, so the heatmap reuses the rows.
    let day_start = now - Duration::hours(24);
    let last_day: Vec<_> = in_range
        .iter()
        .filter(|n| n.created_at >= day_start)
        .cloned()
        .collect();

    Ok(Json(compute_stats(
        &in_range,
        &last_day,
        corrections,
        query.range,
        now,
    )))
}
