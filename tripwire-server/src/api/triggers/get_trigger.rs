use axum::extract::{Path, State};
use axum::response::Response;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `GET /v1/triggers/{id}` — fetch one trigger.
pub async fn get_trigger(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.get_trigger(Ident::new(id)).await {
        Ok(trigger) => ok(&state, trigger),
        Err(err) => failure(&state, err),
    }
}
