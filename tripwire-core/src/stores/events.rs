//! The event store: typed event documents under their event-type
//! namespace, schema validation, and percolation.

use std::collections::BTreeSet;
use std::sync::Arc;

use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tripwire_sdk::Pagination;

use super::{EventType, StoreError, decode_page};
use crate::ident::Ident;
use crate::index::IndexStore;
use crate::mapping;

/// One datum conforming to an event type.
///
/// `cron_schedule` marks a repeating event; `created_by` carries the
/// originating repeating event's id on spawned instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub event_id: Ident,
    pub event_type_id: Ident,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_on: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Ident>,
}

/// Event documents, stored per event-type name.
pub struct EventStore {
    index: Arc<dyn IndexStore>,
    reserved_keys: Vec<String>,
}

impl EventStore {
    /// `reserved_keys` are engine-reserved data keys tolerated in payloads
    /// and stripped before schema comparison.
    pub fn new(index: Arc<dyn IndexStore>, reserved_keys: Vec<String>) -> Self {
        Self {
            index,
            reserved_keys,
        }
    }
}

/// Publish an event type's strict schema under its name.
#[derive(Debug, Clone)]
pub struct RegisterEventMapping {
    pub name: String,
    pub mapping: Value,
}

impl Processor<RegisterEventMapping> for EventStore {
    type Output = ();
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:RegisterMapping")]
    async fn process(&self, msg: RegisterEventMapping) -> Result<(), StoreError> {
        let schema = mapping::build_strict_schema(&msg.name, &msg.mapping)?;
        self.index.set_mapping(&msg.name, &schema).await?;
        Ok(())
    }
}

/// Does an event-type name already own a namespace here?
#[derive(Debug, Clone)]
pub struct EventTypeNameExists {
    pub name: String,
}

impl Processor<EventTypeNameExists> for EventStore {
    type Output = bool;
    type Error = StoreError;
    async fn process(&self, msg: EventTypeNameExists) -> Result<bool, StoreError> {
        Ok(self.index.type_exists(&msg.name).await?)
    }
}

/// Validate an event against its type and store it.
///
/// The validation choke-point: the payload's leaf fields must equal the
/// mapping's declared non-geo leaves exactly, and every value must match
/// its declared tag. The write is flushed so callers that need
/// read-your-writes see the event immediately.
#[derive(Debug, Clone)]
pub struct PutEvent {
    pub type_name: String,
    pub event: Event,
    pub event_type: EventType,
}

impl Processor<PutEvent> for EventStore {
    type Output = Ident;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:Put", fields(type_name = %msg.type_name))]
    async fn process(&self, msg: PutEvent) -> Result<Ident, StoreError> {
        verify_ready_to_post(&msg.event, &msg.event_type, &self.reserved_keys)?;

        let id = msg.event.event_id.clone();
        let doc = serde_json::to_value(&msg.event)?;
        self.index.post_doc(&msg.type_name, id.as_str(), &doc).await?;
        self.index.flush(&msg.type_name).await?;
        Ok(id)
    }
}

/// Fetch one event by type name and id.
#[derive(Debug, Clone)]
pub struct GetEvent {
    pub type_name: String,
    pub id: Ident,
}

impl Processor<GetEvent> for EventStore {
    type Output = Option<Event>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:Get")]
    async fn process(&self, msg: GetEvent) -> Result<Option<Event>, StoreError> {
        let Some(doc) = self.index.get_by_id(&msg.type_name, msg.id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(doc)?))
    }
}

/// List events of one type, or of every type.
#[derive(Debug, Clone)]
pub struct ListEvents {
    pub type_name: Option<String>,
    pub page: Pagination,
}

impl Processor<ListEvents> for EventStore {
    type Output = (Vec<Event>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:List")]
    async fn process(&self, msg: ListEvents) -> Result<(Vec<Event>, u64), StoreError> {
        let page = self
            .index
            .match_all(msg.type_name.as_deref(), &msg.page)
            .await?;
        decode_page(page)
    }
}

/// List events of one type matching a caller-supplied query document.
#[derive(Debug, Clone)]
pub struct QueryEvents {
    pub type_name: String,
    pub query: Value,
    pub page: Pagination,
}

impl Processor<QueryEvents> for EventStore {
    type Output = (Vec<Event>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:Query")]
    async fn process(&self, msg: QueryEvents) -> Result<(Vec<Event>, u64), StoreError> {
        let page = self
            .index
            .search_by_query(&msg.type_name, &msg.query, &msg.page)
            .await?;
        decode_page(page)
    }
}

/// List events of one type filtered by their `eventTypeId` field.
#[derive(Debug, Clone)]
pub struct ListEventsByType {
    pub type_name: String,
    pub event_type_id: Ident,
    pub page: Pagination,
}

impl Processor<ListEventsByType> for EventStore {
    type Output = (Vec<Event>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:ListByType")]
    async fn process(&self, msg: ListEventsByType) -> Result<(Vec<Event>, u64), StoreError> {
        let page = self
            .index
            .filter_by_term(
                &msg.type_name,
                "eventTypeId",
                &Value::String(msg.event_type_id.as_str().to_owned()),
                &msg.page,
            )
            .await?;
        decode_page(page)
    }
}

/// Delete one event.
#[derive(Debug, Clone)]
pub struct DeleteEvent {
    pub type_name: String,
    pub id: Ident,
}

impl Processor<DeleteEvent> for EventStore {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:Delete")]
    async fn process(&self, msg: DeleteEvent) -> Result<bool, StoreError> {
        Ok(self
            .index
            .delete_by_id(&msg.type_name, msg.id.as_str())
            .await?)
    }
}

/// Match event data against the type's registered standing queries.
///
/// Submits `{"data": …}` as the percolation document; the returned ids are
/// the trigger ids whose condition holds. The event itself does not need
/// to be indexed for percolation.
#[derive(Debug, Clone)]
pub struct PercolateEvent {
    pub type_name: String,
    pub data: Map<String, Value>,
    pub event_id: Ident,
}

impl Processor<PercolateEvent> for EventStore {
    type Output = Vec<Ident>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:Percolate", fields(event_id = %msg.event_id))]
    async fn process(&self, msg: PercolateEvent) -> Result<Vec<Ident>, StoreError> {
        let doc = json!({ "data": Value::Object(msg.data) });
        let matches = self.index.percolate(&msg.type_name, &doc).await?;
        Ok(matches.into_iter().map(Ident::new).collect())
    }
}

/// Find which type namespace holds an event id.
///
/// Walks the known type names asking each for the id; used when a caller
/// addresses an event without its type context.
#[derive(Debug, Clone)]
pub struct LookupTypeName {
    pub id: Ident,
}

impl Processor<LookupTypeName> for EventStore {
    type Output = String;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "EventStore:LookupTypeName")]
    async fn process(&self, msg: LookupTypeName) -> Result<String, StoreError> {
        for type_name in self.index.type_names().await? {
            if self.index.doc_exists(&type_name, msg.id.as_str()).await? {
                return Ok(type_name);
            }
        }
        Err(StoreError::not_found("event", &msg.id))
    }
}

/// Check an event payload against its type's mapping.
fn verify_ready_to_post(
    event: &Event,
    event_type: &EventType,
    reserved_keys: &[String],
) -> Result<(), StoreError> {
    let leaves = mapping::flatten_mapping(&event_type.mapping)?;

    // Geo-typed fields are excluded from the set comparison and validated
    // only when present; reserved keys are stripped from the payload side.
    let mut skip: BTreeSet<String> = leaves
        .iter()
        .filter(|(_, field)| field.scalar.is_geo())
        .map(|(path, _)| path.clone())
        .collect();
    skip.extend(reserved_keys.iter().cloned());

    let declared: BTreeSet<&String> = leaves
        .iter()
        .filter(|(_, field)| !field.scalar.is_geo())
        .map(|(path, _)| path)
        .collect();
    let supplied = mapping::flatten_data(&event.data, &skip);

    let missing: Vec<String> = declared
        .iter()
        .filter(|path| !supplied.contains_key(path.as_str()))
        .map(|path| (*path).clone())
        .collect();
    let extra: Vec<String> = supplied
        .keys()
        .filter(|path| !declared.contains(path))
        .cloned()
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(StoreError::Schema { missing, extra });
    }

    for (path, &value) in &supplied {
        if let Some(field) = leaves.get(path.as_str()) {
            mapping::validate_value(field, value).map_err(|reason| {
                StoreError::InvalidValue {
                    field: path.clone(),
                    reason,
                }
            })?;
        }
    }

    // Geo values are validated when the payload carries them.
    for (path, field) in leaves.iter().filter(|(_, f)| f.scalar.is_geo()) {
        if let Some(value) = data_at_path(&event.data, path) {
            mapping::validate_value(field, value).map_err(|reason| StoreError::InvalidValue {
                field: path.clone(),
                reason,
            })?;
        }
    }
    Ok(())
}

fn data_at_path<'v>(data: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut steps = path.split('.');
    let mut cursor = data.get(steps.next()?)?;
    for step in steps {
        cursor = cursor.as_object()?.get(step)?;
    }
    Some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_type(mapping: Value) -> EventType {
        EventType {
            event_type_id: Ident::new("et-1"),
            name: "ship-sighting".into(),
            mapping,
            created_on: OffsetDateTime::now_utc(),
        }
    }

    fn event(data: Value) -> Event {
        Event {
            event_id: Ident::new("ev-1"),
            event_type_id: Ident::new("et-1"),
            data: data.as_object().cloned().unwrap_or_default(),
            created_on: OffsetDateTime::now_utc(),
            cron_schedule: None,
            created_by: None,
        }
    }

    #[test]
    fn conforming_payload_passes() {
        let et = event_type(json!({"num": "integer", "str": "string"}));
        let ev = event(json!({"num": 17, "str": "quick"}));
        assert!(verify_ready_to_post(&ev, &et, &[]).is_ok());
    }

    #[test]
    fn missing_field_is_named() {
        let et = event_type(json!({"num": "integer", "str": "string"}));
        let ev = event(json!({"num": 17}));
        match verify_ready_to_post(&ev, &et, &[]) {
            Err(StoreError::Schema { missing, extra }) => {
                assert_eq!(missing, vec!["str".to_owned()]);
                assert!(extra.is_empty());
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn extra_field_is_named() {
        let et = event_type(json!({"num": "integer", "str": "string"}));
        let ev = event(json!({"num": 17, "str": "x", "extra": 1}));
        match verify_ready_to_post(&ev, &et, &[]) {
            Err(StoreError::Schema { missing, extra }) => {
                assert!(missing.is_empty());
                assert_eq!(extra, vec!["extra".to_owned()]);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let et = event_type(json!({"num": "integer"}));
        let ev = event(json!({"num": "seventeen"}));
        assert!(matches!(
            verify_ready_to_post(&ev, &et, &[]),
            Err(StoreError::InvalidValue { field, .. }) if field == "num"
        ));
    }

    #[test]
    fn geo_fields_may_be_absent_but_validate_when_present() {
        let et = event_type(json!({"num": "integer", "where": "geo_point"}));

        let absent = event(json!({"num": 1}));
        assert!(verify_ready_to_post(&absent, &et, &[]).is_ok());

        let good = event(json!({"num": 1, "where": {"lon": -77.0, "lat": 38.9}}));
        assert!(verify_ready_to_post(&good, &et, &[]).is_ok());

        let bad = event(json!({"num": 1, "where": {"lon": "west"}}));
        assert!(matches!(
            verify_ready_to_post(&bad, &et, &[]),
            Err(StoreError::InvalidValue { field, .. }) if field == "where"
        ));
    }

    #[test]
    fn reserved_keys_are_stripped_before_comparison() {
        let et = event_type(json!({"num": "integer"}));
        let ev = event(json!({"num": 1, "requestorId": "svc-7"}));
        assert!(verify_ready_to_post(&ev, &et, &[]).is_err());
        assert!(verify_ready_to_post(&ev, &et, &["requestorId".to_owned()]).is_ok());
    }

    #[test]
    fn nested_mappings_compare_by_dotted_path() {
        let et = event_type(json!({"outer": {"inner": "string"}}));
        let ev = event(json!({"outer": {"inner": "deep"}}));
        assert!(verify_ready_to_post(&ev, &et, &[]).is_ok());

        let flat = event(json!({"outer": "shallow"}));
        assert!(verify_ready_to_post(&flat, &et, &[]).is_err());
    }
}
