use axum::Json;
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;

use crate::api::respond::{created, failure};
use crate::state::AppState;

/// Body of a schema registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeDraft {
    pub name: String,
    pub mapping: Value,
}

/// `POST /v1/eventtypes` — register a named event schema.
pub async fn post_event_type(
    State(state): State<AppState>,
    Json(draft): Json<EventTypeDraft>,
) -> Response {
    match state.engine.post_event_type(draft.name, draft.mapping).await {
        Ok(event_type) => created(&state, event_type),
        Err(err) => failure(&state, err),
    }
}
