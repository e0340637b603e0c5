//! Engine-level errors and their severity ordering.

use crate::ident::Ident;
use crate::stores::StoreError;

/// Classification of an engine error, ordered by severity.
///
/// The dispatcher's fan-out surfaces the most severe failure it collected:
/// `Internal` outranks `BadRequest`, which outranks `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// The HTTP status code the edge maps this kind to.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Internal => 500,
        }
    }
}

/// Any failure surfaced by a public engine operation.
///
/// Every variant carries a human-readable message already tagged with the
/// component that produced it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// Caller supplied malformed input: bad query params, schema mismatch
    /// on event post, an unknown referenced id, an invalid cron expression.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed id does not exist.
    #[error("{0}")]
    NotFound(Ident),

    /// A unique name is already in use.
    #[error("{0}")]
    Conflict(String),

    /// Store failure, bus failure, or serialization failure.
    #[error("{0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::BadRequest(_) => ErrorKind::BadRequest,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Conflict(_) => ErrorKind::Conflict,
            WorkflowError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        WorkflowError::BadRequest(message.into())
    }

    pub fn not_found(id: impl Into<Ident>) -> Self {
        WorkflowError::NotFound(id.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        WorkflowError::Internal(message.into())
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { id, .. } => WorkflowError::NotFound(id.clone()),
            StoreError::NameTaken { .. } => WorkflowError::Conflict(err.to_string()),
            StoreError::Schema { .. }
            | StoreError::InvalidValue { .. }
            | StoreError::UnknownEventType(_)
            | StoreError::Mapping(_)
            | StoreError::InvalidQuery(_) => WorkflowError::BadRequest(err.to_string()),
            StoreError::Index(
                crate::index::IndexError::InvalidQuery(_)
                | crate::index::IndexError::UnknownType(_),
            ) => WorkflowError::BadRequest(err.to_string()),
            StoreError::Index(_) | StoreError::Serde(_) => WorkflowError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(ErrorKind::Internal > ErrorKind::BadRequest);
        assert!(ErrorKind::BadRequest > ErrorKind::Conflict);
        assert!(ErrorKind::Conflict > ErrorKind::NotFound);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }
}
