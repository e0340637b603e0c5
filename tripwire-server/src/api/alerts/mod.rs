//! Alert routes.
//!
//! - `GET    /v1/alerts`      – list, optionally filtered by `triggerId`
//!   (validated as a UUID)
//! - `GET    /v1/alerts/{id}` – fetch one
//! - `DELETE /v1/alerts/{id}` – delete the audit row

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

mod delete_alert;
mod get_alert;
mod list_alerts;

/// Build the alert router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_alerts::list_alerts))
        .route(
            "/{id}",
            get(get_alert::get_alert).delete(delete_alert::delete_alert),
        )
}
