//! Wire objects shared by the engine, the HTTP edge, and API clients.

mod admin;
mod pagination;
mod response;

pub use admin::{AdminSettings, AdminStats};
pub use pagination::{Pagination, SortOrder};
pub use response::{
    ApiResponse, STATUS_BAD_REQUEST, STATUS_CONFLICT, STATUS_CREATED, STATUS_INTERNAL_ERROR,
    STATUS_NOT_FOUND, STATUS_OK,
};
