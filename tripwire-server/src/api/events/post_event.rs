use axum::Json;
use axum::extract::State;
use axum::response::Response;
use tripwire_core::stores::Event;

use crate::api::respond::{created, failure};
use crate::state::AppState;

/// `POST /v1/events` — validate, store, and dispatch one event.
///
/// A body carrying a non-empty `cronSchedule` registers a repeating event
/// instead of dispatching.
pub async fn post_event(State(state): State<AppState>, Json(event): Json<Event>) -> Response {
    match state.engine.post_event(event).await {
        Ok(event) => created(&state, event),
        Err(err) => failure(&state, err),
    }
}
