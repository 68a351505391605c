use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::now_micros;
use crate::models::preferences::{DeliveryWindow, Preferences};
use crate::preferences::{next_window, validate_windows, UpcomingWindow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub delivery_windows: Vec<DeliveryWindow>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub delivery_windows: Vec<DeliveryWindow>,
    pub next_window: Option<UpcomingWindow>,
}

fn respond(windows: Vec<DeliveryWindow>) -> Json<PreferencesResponse> {
    let next_window = next_window(&windows, now_micros());
    Json(PreferencesResponse {
        delivery_windows: windows,
        next_window,
    })
}

/// GET /api/v1/preferences
pub async fn handle_get_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PreferencesResponse>, AppError> {
    let windows = state
        .store
        .get_preferences(user_id)
        .await?
        .map(|p| p.delivery_windows)
        .unwrap_or_default();
    Ok(respond(windows))
}

/// PUT /api/v1/preferences
pub async fn handle_put_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(request): AppJson<PreferencesRequest>,
) -> Result<Json<PreferencesResponse>, AppError> {
    validate_windows(&request.delivery_windows)?;
    let preferences = Preferences {
        user_id,
        delivery_windows: request.delivery_windows,
        updated_at: now_micros(),
    };
    state.store.put_preferences(&preferences).await?;
    Ok(respond(preferences.delivery_windows))
}
