use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::api::respond::{bind_page, failure, ok_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventTypesQuery {
    pub per_page: Option<usize>,
    pub page: Option<usize>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// `GET /v1/eventtypes` — list registry rows, paginated.
pub async fn list_event_types(
    State(state): State<AppState>,
    Query(query): Query<ListEventTypesQuery>,
) -> Response {
    let page = match bind_page(
        "eventTypeId",
        query.per_page,
        query.page,
        query.sort_by,
        query.order,
    ) {
        Ok(page) => page,
        Err(err) => return failure(&state, err),
    };
    match state.engine.list_event_types(page.clone()).await {
        Ok((event_types, total)) => ok_page(&state, event_types, page, total),
        Err(err) => failure(&state, err),
    }
}
