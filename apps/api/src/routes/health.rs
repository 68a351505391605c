use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::StoreBackend;
use crate::state::AppState;

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let store = match state.config.store_backend {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };
    let sources: Vec<&str> = state.sources.iter().map(|s| s.name()).collect();
    Json(json!({
        "status": "ok",
        "service": "triage-api",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
        "sources": sources,
    }))
}
