//! Axum route handlers for listings and notification mutations.

use axum::{
    extract::State,
    Json,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::correction::Correction;
use crate::models::notification::{Notification, Zone};
use crate::models::now_micros;
use crate::state::AppState;
use crate::zones::service::ZoneListing;
use crate::zones::state_machine::Transition;

const CORRECTIONS_PAGE_SIZE: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Body of the mutation entry point, tagged by `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Dismiss,
    Snooze {
        until: Option<DateTime<Utc>>,
    },
    /// The client's view of the item before the move. The correction log
    /// records the stored state instead; a mismatch is only logged.
    Move {
        #[serde(default, alias = "destinationZone")]
        destination_zone: Option<Zone>,
        #[serde(default, alias = "originalZone")]
        original_zone: Option<Zone>,
        #[serde(default, alias = "rawText")]
        raw_text: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Restore,
    Delete,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    /// Absent after a delete.
    pub notification: Option<Notification>,
    /// Present after a move.
    pub correction: Option<Correction>,
}

#[derive(Debug, Serialize)]
pub struct HandledResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct CorrectionsResponse {
    pub corrections: Vec<Correction>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/notifications
pub async fn handle_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ZoneListing>, AppError> {
    Ok(Json(state.zones().active_listing(user_id).await?))
}

/// GET /api/v1/notifications/handled
pub async fn handle_list_handled(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<HandledResponse>, AppError> {
    let notifications = state
        .zones()
        .handled(user_id, state.config.handled_page_size)
        .await?;
    Ok(Json(HandledResponse { notifications }))
}

/// POST /api/v1/notifications/:id/actions
pub async fn handle_action(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let zones = state.zones();
    let now = now_micros();

    let transition = match request {
        ActionRequest::Dismiss => Transition::Dismiss,
        ActionRequest::Restore => Transition::Restore,
        ActionRequest::Snooze { until } => Transition::Snooze {
            until: required(until, "until")?.trunc_subsecs(6),
        },
        ActionRequest::Delete => {
            zones.delete(user_id, id).await?;
            return Ok(Json(ActionResponse {
                notification: None,
                correction: None,
            }));
        }
        ActionRequest::Move {
            destination_zone,
            original_zone,
            raw_text,
            confidence,
        } => {
            let destination = required(destination_zone, "destination_zone")?;
            let client_original = required(original_zone, "original_zone")?;
            required(raw_text, "raw_text")?;
            let confidence = required(confidence, "confidence")?;
            if !(0.0..=1.0).contains(&confidence) {
                return Err(AppError::Validation(
                    "confidence must be between 0 and 1".to_string(),
                ));
            }

            let outcome = zones.override_zone(user_id, id, destination, now).await?;
            if outcome.correction.original_zone != client_original {
                debug!(
                    "Client saw notification {id} in {client_original}, stored zone was {}",
                    outcome.correction.original_zone
                );
            }
            return Ok(Json(ActionResponse {
                notification: Some(outcome.notification),
                correction: Some(outcome.correction),
            }));
        }
    };

    let notification = zones.transition(user_id, id, transition, now).await?;
    Ok(Json(ActionResponse {
        notification: Some(notification),
        correction: None,
    }))
}

/// GET /api/v1/corrections
pub async fn handle_list_corrections(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CorrectionsResponse>, AppError> {
    let corrections = state
        .store
        .list_corrections(user_id, CORRECTIONS_PAGE_SIZE)
        .await?;
    Ok(Json(CorrectionsResponse { corrections }))
}
