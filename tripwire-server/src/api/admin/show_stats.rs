use axum::extract::State;
use axum::response::Response;

use crate::api::respond::ok;
use crate::state::AppState;

/// `GET /v1/admin/stats` — dispatch counters since startup.
pub async fn show_stats(State(state): State<AppState>) -> Response {
    ok(&state, state.engine.admin_stats())
}
