//! The alert store: an append-only record of (event, trigger, job)
//! matches.

use std::sync::Arc;

use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tripwire_sdk::Pagination;

use super::{StoreError, decode_page, empty_when_unknown};
use crate::ident::Ident;
use crate::index::IndexStore;

const DOC_TYPE: &str = "alert";

/// An audit record of one dispatch: the event, the trigger it matched,
/// and the job that was submitted. Immutable once created, and
/// independent of its referents: deleting the trigger or the event leaves
/// the alert in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub alert_id: Ident,
    pub event_id: Ident,
    pub trigger_id: Ident,
    pub job_id: Ident,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
}

/// Append-only alert records. Duplicate logical alerts (the same event
/// and trigger firing twice) are distinct rows.
pub struct AlertStore {
    index: Arc<dyn IndexStore>,
}

impl AlertStore {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self { index }
    }
}

/// Append one alert under its assigned id.
#[derive(Debug, Clone)]
pub struct PutAlert {
    pub alert: Alert,
}

impl Processor<PutAlert> for AlertStore {
    type Output = Ident;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "AlertStore:Put")]
    async fn process(&self, msg: PutAlert) -> Result<Ident, StoreError> {
        let id = msg.alert.alert_id.clone();
        let doc = serde_json::to_value(&msg.alert)?;
        self.index.post_doc(DOC_TYPE, id.as_str(), &doc).await?;
        Ok(id)
    }
}

/// Fetch one alert by id.
#[derive(Debug, Clone)]
pub struct GetAlert {
    pub id: Ident,
}

impl Processor<GetAlert> for AlertStore {
    type Output = Option<Alert>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "AlertStore:Get")]
    async fn process(&self, msg: GetAlert) -> Result<Option<Alert>, StoreError> {
        let Some(doc) = self.index.get_by_id(DOC_TYPE, msg.id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(doc)?))
    }
}

/// List alerts, paginated.
#[derive(Debug, Clone)]
pub struct ListAlerts {
    pub page: Pagination,
}

impl Processor<ListAlerts> for AlertStore {
    type Output = (Vec<Alert>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "AlertStore:List")]
    async fn process(&self, msg: ListAlerts) -> Result<(Vec<Alert>, u64), StoreError> {
        let page = empty_when_unknown(self.index.match_all(Some(DOC_TYPE), &msg.page).await)?;
        decode_page(page)
    }
}

/// List the alerts recorded for one trigger.
#[derive(Debug, Clone)]
pub struct ListAlertsByTrigger {
    pub trigger_id: Ident,
    pub page: Pagination,
}

impl Processor<ListAlertsByTrigger> for AlertStore {
    type Output = (Vec<Alert>, u64);
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "AlertStore:ListByTrigger")]
    async fn process(&self, msg: ListAlertsByTrigger) -> Result<(Vec<Alert>, u64), StoreError> {
        let page = empty_when_unknown(
            self.index
                .filter_by_term(
                    DOC_TYPE,
                    "triggerId",
                    &Value::String(msg.trigger_id.as_str().to_owned()),
                    &msg.page,
                )
                .await,
        )?;
        decode_page(page)
    }
}

/// Delete one alert record.
#[derive(Debug, Clone)]
pub struct DeleteAlert {
    pub id: Ident,
}

impl Processor<DeleteAlert> for AlertStore {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "AlertStore:Delete")]
    async fn process(&self, msg: DeleteAlert) -> Result<bool, StoreError> {
        Ok(self.index.delete_by_id(DOC_TYPE, msg.id.as_str()).await?)
    }
}
