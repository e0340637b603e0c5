use axum::extract::{Path, State};
use axum::response::Response;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `GET /v1/events/{id}` — fetch one event by id.
pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.get_event(Ident::new(id)).await {
        Ok(event) => ok(&state, event),
        Err(err) => failure(&state, err),
    }
}
