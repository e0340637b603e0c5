//! The index-store seam: typed document storage with per-type schemas and
//! percolation.
//!
//! Each store in the engine owns one index namespace through an
//! `Arc<dyn IndexStore>` handle. Two implementations ship: [`MemoryIndex`]
//! for tests, development, and single-process deployments, and [`PgIndex`]
//! persisting documents as Postgres JSONB rows. Documents are loosely
//! typed `serde_json::Value`s; the stores adapt.

mod memory;
mod postgres;
pub mod query;

pub use memory::MemoryIndex;
pub use postgres::{PgIndex, ensure_schema};

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use tripwire_sdk::{Pagination, SortOrder};

use query::QueryError;

/// Failures reported by an index backend.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("type {0} does not exist")]
    UnknownType(String),

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    #[error("index backend error: {0}")]
    Backend(String),
}

/// One page of search hits plus the total hit count before paging.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub hits: Vec<Value>,
    pub total: u64,
}

/// Typed document storage with per-type schemas and a percolation query.
///
/// Types are created implicitly on first write; `set_mapping` attaches a
/// schema and creates the type when needed. `percolate` on an unknown type
/// reports no matches rather than failing, since an empty type and an
/// absent type answer the same question.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn create_type(&self, typ: &str, schema: Option<&Value>) -> Result<(), IndexError>;
    async fn delete_type(&self, typ: &str) -> Result<bool, IndexError>;
    async fn type_exists(&self, typ: &str) -> Result<bool, IndexError>;
    async fn type_names(&self) -> Result<Vec<String>, IndexError>;
    async fn set_mapping(&self, typ: &str, schema: &Value) -> Result<(), IndexError>;
    async fn get_mapping(&self, typ: &str) -> Result<Option<Value>, IndexError>;

    async fn post_doc(&self, typ: &str, id: &str, doc: &Value) -> Result<(), IndexError>;
    async fn get_by_id(&self, typ: &str, id: &str) -> Result<Option<Value>, IndexError>;
    async fn delete_by_id(&self, typ: &str, id: &str) -> Result<bool, IndexError>;
    async fn doc_exists(&self, typ: &str, id: &str) -> Result<bool, IndexError>;

    /// All documents, of one type or (with `None`) of every type.
    async fn match_all(&self, typ: Option<&str>, page: &Pagination)
    -> Result<SearchPage, IndexError>;
    /// Documents of one type matching a standing-query document.
    async fn search_by_query(
        &self,
        typ: &str,
        query: &Value,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError>;
    /// Documents of one type whose `field` equals `value`.
    async fn filter_by_term(
        &self,
        typ: &str,
        field: &str,
        value: &Value,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError>;

    /// Register a standing query under the caller's id.
    async fn add_percolator(&self, typ: &str, id: &str, query: &Value) -> Result<(), IndexError>;
    async fn remove_percolator(&self, typ: &str, id: &str) -> Result<bool, IndexError>;
    /// Ids of every registered standing query the document satisfies.
    async fn percolate(&self, typ: &str, doc: &Value) -> Result<Vec<String>, IndexError>;

    /// Make prior writes visible to subsequent reads.
    async fn flush(&self, typ: &str) -> Result<(), IndexError>;
}

/// Sort hits by the requested field and slice out the requested page.
///
/// Numbers sort before strings; documents missing the sort field sort
/// last. Shared by both backends so pagination behaves identically.
pub(crate) fn sort_and_page(mut docs: Vec<Value>, page: &Pagination) -> SearchPage {
    let total = docs.len() as u64;
    docs.sort_by(|a, b| {
        let ord = compare_fields(doc_field(a, &page.sort_by), doc_field(b, &page.sort_by));
        match page.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    let hits = docs
        .into_iter()
        .skip(page.offset())
        .take(page.per_page)
        .collect();
    SearchPage { hits, total }
}

pub(crate) fn doc_field<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    let mut cursor = doc;
    for step in path.split('.') {
        cursor = cursor.as_object()?.get(step)?;
    }
    Some(cursor)
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paging_sorts_then_slices() {
        let docs = vec![
            json!({"id": "c", "n": 3}),
            json!({"id": "a", "n": 1}),
            json!({"id": "b", "n": 2}),
        ];
        let page = Pagination {
            per_page: 2,
            page: 0,
            sort_by: "id".into(),
            order: SortOrder::Asc,
            count: 0,
        };
        let result = sort_and_page(docs.clone(), &page);
        assert_eq!(result.total, 3);
        assert_eq!(result.hits[0]["id"], "a");
        assert_eq!(result.hits[1]["id"], "b");

        let page = Pagination {
            order: SortOrder::Desc,
            ..page
        };
        let result = sort_and_page(docs, &page);
        assert_eq!(result.hits[0]["id"], "c");
    }

    #[test]
    fn second_page_continues_where_the_first_ended() {
        let docs = (0..5).map(|n| json!({"n": n})).collect::<Vec<_>>();
        let page = Pagination {
            per_page: 2,
            page: 2,
            sort_by: "n".into(),
            order: SortOrder::Asc,
            count: 0,
        };
        let result = sort_and_page(docs, &page);
        assert_eq!(result.total, 5);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0]["n"], 4);
    }
}
