//! Trigger routes.
//!
//! - `POST   /v1/triggers`      – store a trigger and register its
//!   standing query
//! - `GET    /v1/triggers`      – list, paginated
//! - `GET    /v1/triggers/{id}` – fetch one
//! - `DELETE /v1/triggers/{id}` – unregister and delete

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

mod delete_trigger;
mod get_trigger;
mod list_triggers;
mod post_trigger;

/// Build the trigger router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_triggers::list_triggers).post(post_trigger::post_trigger),
        )
        .route(
            "/{id}",
            get(get_trigger::get_trigger).delete(delete_trigger::delete_trigger),
        )
}
