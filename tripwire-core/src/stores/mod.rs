//! Persistent stores, one per index namespace.
//!
//! Every store owns its namespace on the index backend and exposes its
//! operations as message structs processed via
//! [`kanau::processor::Processor`]. Stores link records only by [`Ident`]
//! values; there are no in-memory pointers across stores.

pub mod alerts;
pub mod crons;
pub mod event_types;
pub mod events;
pub mod triggers;

pub use alerts::{Alert, AlertStore};
pub use crons::CronStore;
pub use event_types::{EventType, EventTypeStore};
pub use events::{Event, EventStore};
pub use triggers::{Trigger, TriggerCondition, TriggerJob, TriggerStore};

use crate::ident::Ident;
use crate::index::{IndexError, SearchPage};
use crate::mapping::MappingError;

/// Failures reported by the stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Ident },

    #[error("EventType name {name:?} already exists under EventTypeId {existing}")]
    NameTaken { name: String, existing: Ident },

    #[error("event schema mismatch: missing fields {missing:?}, unexpected fields {extra:?}")]
    Schema {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("event field {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("event type {0} does not exist")]
    UnknownEventType(Ident),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: &Ident) -> Self {
        StoreError::NotFound {
            entity,
            id: id.clone(),
        }
    }
}

/// A store's own namespace type does not exist until its first write; a
/// listing before then is simply empty.
pub(crate) fn empty_when_unknown(
    result: Result<SearchPage, IndexError>,
) -> Result<SearchPage, StoreError> {
    match result {
        Ok(page) => Ok(page),
        Err(IndexError::UnknownType(_)) => Ok(SearchPage::default()),
        Err(err) => Err(err.into()),
    }
}

/// Decode a page of hits into entity records.
pub(crate) fn decode_page<T: serde::de::DeserializeOwned>(
    page: SearchPage,
) -> Result<(Vec<T>, u64), StoreError> {
    let records = page
        .hits
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()?;
    Ok((records, page.total))
}
