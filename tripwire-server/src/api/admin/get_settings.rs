use axum::extract::State;
use axum::response::Response;

use crate::api::respond::ok;
use crate::state::AppState;

/// `GET /v1/admin/settings` — current engine settings.
pub async fn get_settings(State(state): State<AppState>) -> Response {
    ok(&state, state.engine.admin_settings().await)
}
