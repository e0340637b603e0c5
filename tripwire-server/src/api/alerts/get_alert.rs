use axum::extract::{Path, State};
use axum::response::Response;
use tripwire_core::ident::Ident;

use crate::api::respond::{failure, ok};
use crate::state::AppState;

/// `GET /v1/alerts/{id}` — fetch one alert.
pub async fn get_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.get_alert(Ident::new(id)).await {
        Ok(alert) => ok(&state, alert),
        Err(err) => failure(&state, err),
    }
}
