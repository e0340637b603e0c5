use axum::Json;
use axum::extract::State;
use axum::response::Response;
use tripwire_core::stores::Trigger;

use crate::api::respond::{created, failure};
use crate::state::AppState;

/// `POST /v1/triggers` — store a trigger and register its standing query
/// under every referenced event type.
pub async fn post_trigger(State(state): State<AppState>, Json(trigger): Json<Trigger>) -> Response {
    match state.engine.post_trigger(trigger).await {
        Ok(trigger) => created(&state, trigger),
        Err(err) => failure(&state, err),
    }
}
