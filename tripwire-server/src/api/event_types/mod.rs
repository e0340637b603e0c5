//! Event-type routes.
//!
//! - `POST   /v1/eventtypes`      – register a schema
//! - `GET    /v1/eventtypes`      – list, paginated
//! - `GET    /v1/eventtypes/{id}` – fetch one
//! - `DELETE /v1/eventtypes/{id}` – remove the registry row

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

mod delete_event_type;
mod get_event_type;
mod list_event_types;
mod post_event_type;

/// Build the event-type router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_event_types::list_event_types).post(post_event_type::post_event_type),
        )
        .route(
            "/{id}",
            get(get_event_type::get_event_type).delete(delete_event_type::delete_event_type),
        )
}
