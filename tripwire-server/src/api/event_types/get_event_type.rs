use axum::extract::{Path, State};
use axum::response::Response;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `GET /v1/eventtypes/{id}` — fetch one event type.
pub async fn get_event_type(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.get_event_type(Ident::new(id)).await {
        Ok(event_type) => ok(&state, event_type),
        Err(err) => failure(&state, err),
    }
}
