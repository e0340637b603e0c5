//! The trigger store: trigger records plus their standing-query
//! registrations in the event index.

use std::sync::Arc;

use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tripwire_sdk::Pagination;

use super::{StoreError, decode_page, empty_when_unknown};
use crate::ident::Ident;
use crate::index::{IndexError, IndexStore};

const DOC_TYPE: &str = "trigger";

/// A standing query over one or more event types plus the job to submit
/// on match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(default)]
    pub trigger_id: Ident,
    #[serde(default)]
    pub title: String,
    pub condition: TriggerCondition,
    pub job: TriggerJob,
    #[serde(default)]
    pub enabled: bool,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_on: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCondition {
    pub event_type_ids: Vec<Ident>,
    pub query: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerJob {
    pub task: Value,
}

/// Trigger records; standing queries are registered against the event
/// index under each referenced type name.
pub struct TriggerStore {
    index: Arc<dyn IndexStore>,
    events_index: Arc<dyn IndexStore>,
}

impl TriggerStore {
    pub fn new(index: Arc<dyn IndexStore>, events_index: Arc<dyn IndexStore>) -> Self {
        Self {
            index,
            events_index,
        }
    }

    async fn unregister(&self, type_names: &[String], trigger_id: &Ident) {
        for name in type_names {
            if let Err(err) = self
                .events_index
                .remove_percolator(name, trigger_id.as_str())
                .await
            {
                tracing::warn!(
                    trigger_id = %trigger_id,
                    type_name = %name,
                    error = %err,
                    "trigger store: percolator removal failed"
                );
            }
        }
    }
}

/// Register a trigger's standing query under every referenced event type
/// and store the trigger record.
///
/// All registrations share the trigger's id, so a percolation match
/// dedupes to one alert per (event, trigger). If any registration or the
/// record write fails, the registrations already made are rolled back and
/// nothing is stored.
#[derive(Debug, Clone)]
pub struct PutTrigger {
    pub trigger: Trigger,
    /// Resolved names of `condition.event_type_ids`, in the same order.
    pub event_type_names: Vec<String>,
}

impl Processor<PutTrigger> for TriggerStore {
    type Output = Ident;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "TriggerStore:Put")]
    async fn process(&self, msg: PutTrigger) -> Result<Ident, StoreError> {
        let id = msg.trigger.trigger_id.clone();

        for (i, name) in msg.event_type_names.iter().enumerate() {
            let registered = self
                .events_index
                .add_percolator(name, id.as_str(), &msg.trigger.condition.query)
                .await;
            if let Err(err) = registered {
                self.unregister(&msg.event_type_names[..i], &id).await;
                return Err(match err {
                    IndexError::InvalidQuery(e) => StoreError::InvalidQuery(e.to_string()),
                    other => other.into(),
                });
            }
        }

        let doc = match serde_json::to_value(&msg.trigger) {
            Ok(doc) => doc,
            Err(err) => {
                self.unregister(&msg.event_type_names, &id).await;
                return Err(err.into());
            }
        };
        if let Err(err) = self.index.post_doc(DOC_TYPE, id.as_str(), &doc).await {
            self.unregister(&msg.event_type_names, &id).await;
            return Err(err.into());
        }
        Ok(id)
    }
}

/// Fetch one trigger by id.
#[derive(Debug, Clone)]
pub struct GetTrigger {
    pub id: Ident,
}

impl Processor<GetTrigger> for TriggerStore {
    type Output = Option<Trigger>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "TriggerStore:Get")]
    async fn process(&self, msg: GetTrigger) -> Result<Option<Trigger>, StoreError> {
        let Some(doc) = self.index.get_by_id(DOC_TYPE, msg.id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(doc)?))
    }
}

/// List triggers, paginated.
#[derive(Debug, Clone)]
pub struct ListTriggers {
    pub page: Pagination,
}

impl Processor<ListTriggers> for TriggerStore {
    type Output = (Vec<Trigger>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "TriggerStore:List")]
    async fn process(&self, msg: ListTriggers) -> Result<(Vec<Trigger>, u64), StoreError> {
        let page = empty_when_unknown(self.index.match_all(Some(DOC_TYPE), &msg.page).await)?;
        decode_page(page)
    }
}

/// Remove a trigger's standing-query registrations and its record.
///
/// Percolator cleanup is best-effort: a failed removal is logged and the
/// remaining types are still cleaned before the record is deleted.
#[derive(Debug, Clone)]
pub struct DeleteTrigger {
    pub id: Ident,
    /// Resolved names of the trigger's event types; types whose registry
    /// row is already gone are simply absent.
    pub event_type_names: Vec<String>,
}

impl Processor<DeleteTrigger> for TriggerStore {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "TriggerStore:Delete")]
    async fn process(&self, msg: DeleteTrigger) -> Result<bool, StoreError> {
        self.unregister(&msg.event_type_names, &msg.id).await;
        Ok(self.index.delete_by_id(DOC_TYPE, msg.id.as_str()).await?)
    }
}
