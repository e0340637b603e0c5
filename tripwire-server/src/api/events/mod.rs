//! Event routes.
//!
//! - `POST   /v1/events`      – dispatch an event (or register a repeating
//!   one when the body carries a `cronSchedule`)
//! - `GET    /v1/events`      – list, optionally filtered by
//!   `eventTypeId` or `eventTypeName` (the id wins when both are given)
//! - `GET    /v1/events/{id}` – fetch one
//! - `DELETE /v1/events/{id}` – delete; repeating events are unscheduled

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

mod delete_event;
mod get_event;
mod list_events;
mod post_event;

/// Build the event router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events::list_events).post(post_event::post_event))
        .route(
            "/{id}",
            get(get_event::get_event).delete(delete_event::delete_event),
        )
}
