use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::Value;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `DELETE /v1/events/{id}` — delete one event.
///
/// A repeating event also loses its cron row and scheduler entry.
pub async fn delete_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.delete_event(Ident::new(id)).await {
        Ok(()) => ok(&state, Value::Null),
        Err(err) => failure(&state, err),
    }
}
