//! Admin routes.
//!
//! - `GET  /v1/admin/stats`    – dispatch counters since startup
//! - `GET  /v1/admin/settings` – current engine settings
//! - `POST /v1/admin/settings` – replace the engine settings

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

mod get_settings;
mod post_settings;
mod show_stats;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(show_stats::show_stats))
        .route(
            "/settings",
            get(get_settings::get_settings).post(post_settings::post_settings),
        )
}
