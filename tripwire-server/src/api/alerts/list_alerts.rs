use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::api::respond::{bind_page, failure, ok_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertsQuery {
    pub per_page: Option<usize>,
    pub page: Option<usize>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub trigger_id: Option<String>,
}

/// `GET /v1/alerts` — list alerts, optionally filtered by `triggerId`.
///
/// The filter must be a well-formed UUID.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Response {
    let page = match bind_page(
        "alertId",
        query.per_page,
        query.page,
        query.sort_by,
        query.order,
    ) {
        Ok(page) => page,
        Err(err) => return failure(&state, err),
    };
    match state.engine.list_alerts(query.trigger_id, page.clone()).await {
        Ok((alerts, total)) => ok_page(&state, alerts, page, total),
        Err(err) => failure(&state, err),
    }
}
