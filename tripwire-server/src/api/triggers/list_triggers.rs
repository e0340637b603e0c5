use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::api::respond::{bind_page, failure, ok_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTriggersQuery {
    pub per_page: Option<usize>,
    pub page: Option<usize>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// `GET /v1/triggers` — list triggers, paginated.
pub async fn list_triggers(
    State(state): State<AppState>,
    Query(query): Query<ListTriggersQuery>,
) -> Response {
    let page = match bind_page(
        "triggerId",
        query.per_page,
        query.page,
        query.sort_by,
        query.order,
    ) {
        Ok(page) => page,
        Err(err) => return failure(&state, err),
    };
    match state.engine.list_triggers(page.clone()).await {
        Ok((triggers, total)) => ok_page(&state, triggers, page, total),
        Err(err) => failure(&state, err),
    }
}
