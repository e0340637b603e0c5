#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Shared wire objects for the Tripwire workflow engine.
//!
//! Every Tripwire API response uses the same envelope: a status code, either
//! a `data` payload or an error `message`, the name of the deployment that
//! produced the response, and (for list endpoints) a pagination block.
//! This crate defines those objects so that the engine, the HTTP edge, and
//! external callers agree on the wire format.
//!
//! The optional `client` feature adds a typed `reqwest` client for the REST
//! surface.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;

pub use objects::{
    AdminSettings, AdminStats, ApiResponse, Pagination, SortOrder, STATUS_BAD_REQUEST,
    STATUS_CONFLICT, STATUS_CREATED, STATUS_INTERNAL_ERROR, STATUS_NOT_FOUND, STATUS_OK,
};
