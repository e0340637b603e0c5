//! The event-type registry.

use std::sync::Arc;

use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tripwire_sdk::Pagination;

use super::{StoreError, decode_page, empty_when_unknown};
use crate::ident::Ident;
use crate::index::{IndexError, IndexStore};

const DOC_TYPE: &str = "eventtype";

/// A named, strictly-typed schema for event payloads.
///
/// Once the mapping is published to the event store it is immutable; a
/// new shape of payload needs a new event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    #[serde(default)]
    pub event_type_id: Ident,
    pub name: String,
    pub mapping: Value,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_on: OffsetDateTime,
}

/// Registry of event types, one row per published schema.
pub struct EventTypeStore {
    index: Arc<dyn IndexStore>,
}

impl EventTypeStore {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self { index }
    }
}

/// Store a registry row under its assigned id.
#[derive(Debug, Clone)]
pub struct PutEventType {
    pub event_type: EventType,
}

impl Processor<PutEventType> for EventTypeStore {
    type Output = Ident;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventTypeStore:Put")]
    async fn process(&self, msg: PutEventType) -> Result<Ident, StoreError> {
        let id = msg.event_type.event_type_id.clone();
        let doc = serde_json::to_value(&msg.event_type)?;
        self.index.post_doc(DOC_TYPE, id.as_str(), &doc).await?;
        Ok(id)
    }
}

/// Fetch one event type by id.
#[derive(Debug, Clone)]
pub struct GetEventType {
    pub id: Ident,
}

impl Processor<GetEventType> for EventTypeStore {
    type Output = Option<EventType>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventTypeStore:Get")]
    async fn process(&self, msg: GetEventType) -> Result<Option<EventType>, StoreError> {
        let Some(doc) = self.index.get_by_id(DOC_TYPE, msg.id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(doc)?))
    }
}

/// Resolve an event type's id from its unique name.
#[derive(Debug, Clone)]
pub struct GetEventTypeIdByName {
    pub name: String,
}

impl Processor<GetEventTypeIdByName> for EventTypeStore {
    type Output = Option<Ident>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventTypeStore:GetIdByName")]
    async fn process(&self, msg: GetEventTypeIdByName) -> Result<Option<Ident>, StoreError> {
        let page = Pagination::for_entity("eventTypeId");
        let result = self
            .index
            .filter_by_term(DOC_TYPE, "name", &Value::String(msg.name), &page)
            .await;
        let hits = match result {
            Ok(page) => page.hits,
            Err(IndexError::UnknownType(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let Some(doc) = hits.into_iter().next() else {
            return Ok(None);
        };
        let event_type: EventType = serde_json::from_value(doc)?;
        Ok(Some(event_type.event_type_id))
    }
}

/// List registry rows, paginated.
#[derive(Debug, Clone)]
pub struct ListEventTypes {
    pub page: Pagination,
}

impl Processor<ListEventTypes> for EventTypeStore {
    type Output = (Vec<EventType>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventTypeStore:List")]
    async fn process(&self, msg: ListEventTypes) -> Result<(Vec<EventType>, u64), StoreError> {
        let page = empty_when_unknown(self.index.match_all(Some(DOC_TYPE), &msg.page).await)?;
        decode_page(page)
    }
}

/// Delete a registry row.
///
/// Events stored under the type's name and percolators referencing it
/// remain addressable; only the registry row goes away.
#[derive(Debug, Clone)]
pub struct DeleteEventType {
    pub id: Ident,
}

impl Processor<DeleteEventType> for EventTypeStore {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventTypeStore:Delete")]
    async fn process(&self, msg: DeleteEventType) -> Result<bool, StoreError> {
        Ok(self.index.delete_by_id(DOC_TYPE, msg.id.as_str()).await?)
    }
}
