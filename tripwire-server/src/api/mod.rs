//! The REST surface, nested under `/v1`.

mod admin;
mod alerts;
mod event_types;
mod events;
mod respond;
mod triggers;

use axum::Router;

use crate::state::AppState;

/// Build the `/v1` API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/eventtypes", event_types::router())
        .nest("/events", events::router())
        .nest("/triggers", triggers::router())
        .nest("/alerts", alerts::router())
        .nest("/admin", admin::router())
}
