use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tripwire_core::ident::Ident;

use crate::api::respond::{bind_page, failure, ok_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub per_page: Option<usize>,
    pub page: Option<usize>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub event_type_id: Option<String>,
    pub event_type_name: Option<String>,
}

/// `GET /v1/events` — list events, optionally filtered by `eventTypeId`
/// or `eventTypeName`; the id wins when both are supplied.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Response {
    let page = match bind_page(
        "eventId",
        query.per_page,
        query.page,
        query.sort_by,
        query.order,
    ) {
        Ok(page) => page,
        Err(err) => return failure(&state, err),
    };
    let result = state
        .engine
        .list_events(
            query.event_type_id.map(Ident::new),
            query.event_type_name,
            page.clone(),
        )
        .await;
    match result {
        Ok((events, total)) => ok_page(&state, events, page, total),
        Err(err) => failure(&state, err),
    }
}
