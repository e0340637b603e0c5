//! The cron store: repeating events, keyed by their event id so the
//! scheduler can replay them at boot.

use std::sync::Arc;

use kanau::processor::Processor;
use tripwire_sdk::Pagination;

use super::events::Event;
use super::{StoreError, decode_page, empty_when_unknown};
use crate::ident::Ident;
use crate::index::IndexStore;

const DOC_TYPE: &str = "cron";

// Replay reads every row in one sweep; repeating events number in the
// hundreds at most.
const REPLAY_PAGE_SIZE: usize = 10_000;

/// Repeating-event rows.
pub struct CronStore {
    index: Arc<dyn IndexStore>,
}

impl CronStore {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self { index }
    }
}

/// Store a repeating event under its event id.
#[derive(Debug, Clone)]
pub struct PutCronEvent {
    pub event: Event,
}

impl Processor<PutCronEvent> for CronStore {
    type Output = Ident;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "CronStore:Put")]
    async fn process(&self, msg: PutCronEvent) -> Result<Ident, StoreError> {
        let id = msg.event.event_id.clone();
        let doc = serde_json::to_value(&msg.event)?;
        self.index.post_doc(DOC_TYPE, id.as_str(), &doc).await?;
        Ok(id)
    }
}

/// Every repeating event on record, for scheduler replay.
#[derive(Debug, Clone)]
pub struct ListCronEvents;

impl Processor<ListCronEvents> for CronStore {
    type Output = Vec<Event>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "CronStore:List")]
    async fn process(&self, _msg: ListCronEvents) -> Result<Vec<Event>, StoreError> {
        let page = Pagination {
            per_page: REPLAY_PAGE_SIZE,
            ..Pagination::for_entity("eventId")
        };
        let page = empty_when_unknown(self.index.match_all(Some(DOC_TYPE), &page).await)?;
        let (events, _) = decode_page(page)?;
        Ok(events)
    }
}

/// Is this id a repeating event?
#[derive(Debug, Clone)]
pub struct CronEventExists {
    pub id: Ident,
}

impl Processor<CronEventExists> for CronStore {
    type Output = bool;
    type Error = StoreError;
    async fn process(&self, msg: CronEventExists) -> Result<bool, StoreError> {
        Ok(self.index.doc_exists(DOC_TYPE, msg.id.as_str()).await?)
    }
}

/// Remove a repeating event's row.
#[derive(Debug, Clone)]
pub struct DeleteCronEvent {
    pub id: Ident,
}

impl Processor<DeleteCronEvent> for CronStore {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "CronStore:Delete")]
    async fn process(&self, msg: DeleteCronEvent) -> Result<bool, StoreError> {
        Ok(self.index.delete_by_id(DOC_TYPE, msg.id.as_str()).await?)
    }
}
