use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::Value;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `DELETE /v1/alerts/{id}` — delete one audit row.
pub async fn delete_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.delete_alert(Ident::new(id)).await {
        Ok(()) => ok(&state, Value::Null),
        Err(err) => failure(&state, err),
    }
}
