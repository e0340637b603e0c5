use axum::Json;
use axum::extract::State;
use axum::response::Response;
use tripwire_sdk::AdminSettings;

use crate::api::respond::ok;
use crate::state::AppState;

/// `POST /v1/admin/settings` — replace the engine settings.
pub async fn post_settings(
    State(state): State<AppState>,
    Json(settings): Json<AdminSettings>,
) -> Response {
    let applied = state.engine.update_admin_settings(settings).await;
    ok(&state, applied)
}
