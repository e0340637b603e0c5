//! In-memory index backend.
//!
//! Keeps every type in a `BTreeMap` bucket behind one `RwLock`. Cloning a
//! `MemoryIndex` shares the underlying state, so a restarted engine built
//! over clones of the same handles sees the previous instance's documents.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tripwire_sdk::Pagination;

use super::query::Query;
use super::{IndexError, IndexStore, SearchPage, doc_field, sort_and_page};

#[derive(Default)]
struct Bucket {
    schema: Option<Value>,
    docs: BTreeMap<String, Value>,
    percolators: BTreeMap<String, Query>,
}

/// One index namespace held in process memory.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    state: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    async fn create_type(&self, typ: &str, schema: Option<&Value>) -> Result<(), IndexError> {
        let mut state = self.state.write().await;
        let bucket = state.entry(typ.to_owned()).or_default();
        if let Some(schema) = schema {
            bucket.schema = Some(schema.clone());
        }
        Ok(())
    }

    async fn delete_type(&self, typ: &str) -> Result<bool, IndexError> {
        Ok(self.state.write().await.remove(typ).is_some())
    }

    async fn type_exists(&self, typ: &str) -> Result<bool, IndexError> {
        Ok(self.state.read().await.contains_key(typ))
    }

    async fn type_names(&self) -> Result<Vec<String>, IndexError> {
        let mut names: Vec<String> = self.state.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_mapping(&self, typ: &str, schema: &Value) -> Result<(), IndexError> {
        self.state
            .write()
            .await
            .entry(typ.to_owned())
            .or_default()
            .schema = Some(schema.clone());
        Ok(())
    }

    async fn get_mapping(&self, typ: &str) -> Result<Option<Value>, IndexError> {
        Ok(self
            .state
            .read()
            .await
            .get(typ)
            .and_then(|bucket| bucket.schema.clone()))
    }

    async fn post_doc(&self, typ: &str, id: &str, doc: &Value) -> Result<(), IndexError> {
        self.state
            .write()
            .await
            .entry(typ.to_owned())
            .or_default()
            .docs
            .insert(id.to_owned(), doc.clone());
        Ok(())
    }

    async fn get_by_id(&self, typ: &str, id: &str) -> Result<Option<Value>, IndexError> {
        Ok(self
            .state
            .read()
            .await
            .get(typ)
            .and_then(|bucket| bucket.docs.get(id).cloned()))
    }

    async fn delete_by_id(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        let mut state = self.state.write().await;
        let Some(bucket) = state.get_mut(typ) else {
            return Ok(false);
        };
        Ok(bucket.docs.remove(id).is_some())
    }

    async fn doc_exists(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        Ok(self
            .state
            .read()
            .await
            .get(typ)
            .is_some_and(|bucket| bucket.docs.contains_key(id)))
    }

    async fn match_all(
        &self,
        typ: Option<&str>,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError> {
        let state = self.state.read().await;
        let docs: Vec<Value> = match typ {
            Some(typ) => {
                let bucket = state
                    .get(typ)
                    .ok_or_else(|| IndexError::UnknownType(typ.to_owned()))?;
                bucket.docs.values().cloned().collect()
            }
            None => state
                .values()
                .flat_map(|bucket| bucket.docs.values().cloned())
                .collect(),
        };
        Ok(sort_and_page(docs, page))
    }

    async fn search_by_query(
        &self,
        typ: &str,
        query: &Value,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError> {
        let compiled = Query::compile(query)?;
        let state = self.state.read().await;
        let bucket = state
            .get(typ)
            .ok_or_else(|| IndexError::UnknownType(typ.to_owned()))?;
        let docs: Vec<Value> = bucket
            .docs
            .values()
            .filter(|doc| compiled.matches(doc))
            .cloned()
            .collect();
        Ok(sort_and_page(docs, page))
    }

    async fn filter_by_term(
        &self,
        typ: &str,
        field: &str,
        value: &Value,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError> {
        let state = self.state.read().await;
        let bucket = state
            .get(typ)
            .ok_or_else(|| IndexError::UnknownType(typ.to_owned()))?;
        let docs: Vec<Value> = bucket
            .docs
            .values()
            .filter(|doc| doc_field(doc, field) == Some(value))
            .cloned()
            .collect();
        Ok(sort_and_page(docs, page))
    }

    async fn add_percolator(&self, typ: &str, id: &str, query: &Value) -> Result<(), IndexError> {
        let compiled = Query::compile(query)?;
        self.state
            .write()
            .await
            .entry(typ.to_owned())
            .or_default()
            .percolators
            .insert(id.to_owned(), compiled);
        Ok(())
    }

    async fn remove_percolator(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        let mut state = self.state.write().await;
        let Some(bucket) = state.get_mut(typ) else {
            return Ok(false);
        };
        Ok(bucket.percolators.remove(id).is_some())
    }

    async fn percolate(&self, typ: &str, doc: &Value) -> Result<Vec<String>, IndexError> {
        let state = self.state.read().await;
        let Some(bucket) = state.get(typ) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .percolators
            .iter()
            .filter(|(_, query)| query.matches(doc))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn flush(&self, _typ: &str) -> Result<(), IndexError> {
        // Writes are immediately visible.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripwire_sdk::SortOrder;

    fn page(sort_by: &str) -> Pagination {
        Pagination {
            per_page: 50,
            page: 0,
            sort_by: sort_by.into(),
            order: SortOrder::Asc,
            count: 0,
        }
    }

    #[tokio::test]
    async fn documents_round_trip() {
        let index = MemoryIndex::new();
        index
            .post_doc("widget", "w1", &json!({"id": "w1", "size": 4}))
            .await
            .unwrap();

        assert!(index.doc_exists("widget", "w1").await.unwrap());
        let doc = index.get_by_id("widget", "w1").await.unwrap().unwrap();
        assert_eq!(doc["size"], 4);

        assert!(index.delete_by_id("widget", "w1").await.unwrap());
        assert!(!index.doc_exists("widget", "w1").await.unwrap());
        assert!(!index.delete_by_id("widget", "w1").await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let index = MemoryIndex::new();
        let other = index.clone();
        index
            .post_doc("widget", "w1", &json!({"id": "w1"}))
            .await
            .unwrap();
        assert!(other.doc_exists("widget", "w1").await.unwrap());
    }

    #[tokio::test]
    async fn percolate_returns_matching_ids_only() {
        let index = MemoryIndex::new();
        index
            .add_percolator("ship", "t-match", &json!({"match": {"num": 17}}))
            .await
            .unwrap();
        index
            .add_percolator("ship", "t-miss", &json!({"match": {"num": 99}}))
            .await
            .unwrap();

        let matches = index
            .percolate("ship", &json!({"data": {"num": 17}}))
            .await
            .unwrap();
        assert_eq!(matches, vec!["t-match".to_owned()]);

        assert!(index.remove_percolator("ship", "t-match").await.unwrap());
        let matches = index
            .percolate("ship", &json!({"data": {"num": 17}}))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn match_all_spans_types_when_unscoped() {
        let index = MemoryIndex::new();
        index
            .post_doc("a", "1", &json!({"id": "1"}))
            .await
            .unwrap();
        index
            .post_doc("b", "2", &json!({"id": "2"}))
            .await
            .unwrap();

        let all = index.match_all(None, &page("id")).await.unwrap();
        assert_eq!(all.total, 2);

        let scoped = index.match_all(Some("a"), &page("id")).await.unwrap();
        assert_eq!(scoped.total, 1);

        assert!(index.match_all(Some("missing"), &page("id")).await.is_err());
    }

    #[tokio::test]
    async fn term_filter_matches_exactly() {
        let index = MemoryIndex::new();
        index
            .post_doc("alert", "a1", &json!({"id": "a1", "triggerId": "t1"}))
            .await
            .unwrap();
        index
            .post_doc("alert", "a2", &json!({"id": "a2", "triggerId": "t2"}))
            .await
            .unwrap();

        let hits = index
            .filter_by_term("alert", "triggerId", &json!("t1"), &page("id"))
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.hits[0]["id"], "a1");
    }

    #[tokio::test]
    async fn bad_percolator_query_is_rejected() {
        let index = MemoryIndex::new();
        let err = index
            .add_percolator("ship", "t", &json!({"fuzzy": {"x": 1}}))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidQuery(_)));
    }
}
