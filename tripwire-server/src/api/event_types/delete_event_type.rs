use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::Value;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `DELETE /v1/eventtypes/{id}` — remove the registry row.
///
/// Events stored under the type's name remain addressable.
pub async fn delete_event_type(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.delete_event_type(Ident::new(id)).await {
        Ok(()) => ok(&state, Value::Null),
        Err(err) => failure(&state, err),
    }
}
