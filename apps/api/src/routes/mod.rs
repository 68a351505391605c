pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::feed::handlers as feed;
use crate::preferences::handlers as preferences;
use crate::state::AppState;
use crate::telemetry::handlers as telemetry;
use crate::triage::handlers as triage;
use crate::zones::handlers as zones;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion
        .route(
            "/api/v1/notifications",
            get(zones::handle_list).post(triage::handle_ingest),
        )
        .route("/api/v1/feed", post(triage::handle_feed))
        // Zone state machine
        .route(
            "/api/v1/notifications/handled",
            get(zones::handle_list_handled),
        )
        .route(
            "/api/v1/notifications/stream",
            get(feed::handle_stream),
        )
        .route(
            "/api/v1/notifications/:id/actions",
            post(zones::handle_action),
        )
        .route("/api/v1/corrections", get(zones::handle_list_corrections))
        // Telemetry
        .route("/api/v1/stats", get(telemetry::handle_stats))
        // Delivery windows
        .route(
            "/api/v1/preferences",
            get(preferences::handle_get_preferences).put(preferences::handle_put_preferences),
        )
        .with_state(state)
}
