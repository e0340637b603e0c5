//! Envelope construction and pagination binding shared by all handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tripwire_core::error::WorkflowError;
use tripwire_sdk::{ApiResponse, Pagination};

use crate::state::AppState;

pub(crate) fn ok<T: Serialize>(state: &AppState, data: T) -> Response {
    let envelope = ApiResponse::ok(state.engine.origin(), data);
    (StatusCode::OK, Json(envelope)).into_response()
}

pub(crate) fn created<T: Serialize>(state: &AppState, data: T) -> Response {
    let envelope = ApiResponse::created(state.engine.origin(), data);
    (StatusCode::CREATED, Json(envelope)).into_response()
}

/// 200 with the pagination block attached when anything was hit.
pub(crate) fn ok_page<T: Serialize>(
    state: &AppState,
    data: Vec<T>,
    mut page: Pagination,
    total: u64,
) -> Response {
    let mut envelope = ApiResponse::ok(state.engine.origin(), data);
    if total > 0 {
        page.count = total as usize;
        envelope = envelope.with_pagination(page);
    }
    (StatusCode::OK, Json(envelope)).into_response()
}

pub(crate) fn failure(state: &AppState, err: WorkflowError) -> Response {
    let status_code = err.kind().status_code();
    let status =
        StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let envelope: ApiResponse<serde_json::Value> =
        ApiResponse::error(state.engine.origin(), status_code, err.to_string());
    (status, Json(envelope)).into_response()
}

/// Bind the common pagination query parameters onto an entity's defaults.
pub(crate) fn bind_page(
    default_sort: &str,
    per_page: Option<usize>,
    page: Option<usize>,
    sort_by: Option<String>,
    order: Option<String>,
) -> Result<Pagination, WorkflowError> {
    Pagination::for_entity(default_sort)
        .with_overrides(per_page, page, sort_by, order.as_deref())
        .map_err(WorkflowError::bad_request)
}
