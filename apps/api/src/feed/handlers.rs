use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        sse::{Event as SseEvent, KeepAlive},
        Sse,
    },
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt as _};
use tracing::debug;

use crate::auth::AuthUser;
use crate::feed::SeenSet;
use crate::state::AppState;

/// GET /api/v1/notifications/stream
///
/// Server-sent change events for the caller's notifications. Both producers
/// feed the same channel; this subscriber drops anything it has already seen.
pub async fn handle_stream(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    debug!("Change stream opened for user {user_id}");
    let mut seen = SeenSet::new();

    let stream = BroadcastStream::new(state.feed.subscribe()).filter_map(move |result| {
        let event = result.ok()?; // lagged receivers skip ahead
        if event.user_id() != user_id || !seen.admit(&event) {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(SseEvent::default().data(data).id(event.id().to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
