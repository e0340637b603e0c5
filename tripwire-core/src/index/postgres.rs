//! Postgres-backed index: documents, schemas, and percolators as JSONB
//! rows namespaced by `(index_name, type_name)`.
//!
//! Standing queries are still evaluated in-process with the shared
//! compiled-query matcher, so both backends honor the same percolation
//! contract.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tripwire_sdk::Pagination;

use super::query::Query;
use super::{IndexError, IndexStore, SearchPage, doc_field, sort_and_page};

/// Create the index tables if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), IndexError> {
    const DDL: &[&str] = &[
        r"CREATE TABLE IF NOT EXISTS idx_types (
            index_name TEXT NOT NULL,
            type_name  TEXT NOT NULL,
            schema     JSONB,
            PRIMARY KEY (index_name, type_name)
        )",
        r"CREATE TABLE IF NOT EXISTS idx_docs (
            index_name TEXT NOT NULL,
            type_name  TEXT NOT NULL,
            doc_id     TEXT NOT NULL,
            doc        JSONB NOT NULL,
            PRIMARY KEY (index_name, type_name, doc_id)
        )",
        r"CREATE TABLE IF NOT EXISTS idx_percolators (
            index_name TEXT NOT NULL,
            type_name  TEXT NOT NULL,
            perc_id    TEXT NOT NULL,
            query      JSONB NOT NULL,
            PRIMARY KEY (index_name, type_name, perc_id)
        )",
    ];
    for ddl in DDL {
        sqlx::query(ddl).execute(pool).await.map_err(backend)?;
    }
    Ok(())
}

/// One index namespace stored in Postgres.
#[derive(Clone)]
pub struct PgIndex {
    pool: PgPool,
    index: String,
}

impl PgIndex {
    pub fn new(pool: PgPool, index: impl Into<String>) -> Self {
        Self {
            pool,
            index: index.into(),
        }
    }

    async fn ensure_type_row(&self, typ: &str) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO idx_types (index_name, type_name) VALUES ($1, $2)
             ON CONFLICT (index_name, type_name) DO NOTHING",
        )
        .bind(&self.index)
        .bind(typ)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn docs_of_type(&self, typ: &str) -> Result<Vec<Value>, IndexError> {
        if !self.type_exists(typ).await? {
            return Err(IndexError::UnknownType(typ.to_owned()));
        }
        let rows = sqlx::query(
            "SELECT doc FROM idx_docs WHERE index_name = $1 AND type_name = $2",
        )
        .bind(&self.index)
        .bind(typ)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("doc").map_err(backend))
            .collect()
    }
}

#[async_trait]
impl IndexStore for PgIndex {
    #[tracing::instrument(skip_all, fields(index = %self.index, typ))]
    async fn create_type(&self, typ: &str, schema: Option<&Value>) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO idx_types (index_name, type_name, schema) VALUES ($1, $2, $3)
             ON CONFLICT (index_name, type_name)
             DO UPDATE SET schema = COALESCE(EXCLUDED.schema, idx_types.schema)",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(schema)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete_type(&self, typ: &str) -> Result<bool, IndexError> {
        for table in ["idx_docs", "idx_percolators"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE index_name = $1 AND type_name = $2"
            ))
            .bind(&self.index)
            .bind(typ)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        }
        let result = sqlx::query("DELETE FROM idx_types WHERE index_name = $1 AND type_name = $2")
            .bind(&self.index)
            .bind(typ)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn type_exists(&self, typ: &str) -> Result<bool, IndexError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM idx_types WHERE index_name = $1 AND type_name = $2)",
        )
        .bind(&self.index)
        .bind(typ)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(exists)
    }

    async fn type_names(&self) -> Result<Vec<String>, IndexError> {
        sqlx::query_scalar(
            "SELECT type_name FROM idx_types WHERE index_name = $1 ORDER BY type_name",
        )
        .bind(&self.index)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn set_mapping(&self, typ: &str, schema: &Value) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO idx_types (index_name, type_name, schema) VALUES ($1, $2, $3)
             ON CONFLICT (index_name, type_name) DO UPDATE SET schema = EXCLUDED.schema",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(schema)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_mapping(&self, typ: &str) -> Result<Option<Value>, IndexError> {
        let schema: Option<Option<Value>> = sqlx::query_scalar(
            "SELECT schema FROM idx_types WHERE index_name = $1 AND type_name = $2",
        )
        .bind(&self.index)
        .bind(typ)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(schema.flatten())
    }

    #[tracing::instrument(skip_all, fields(index = %self.index, typ, id))]
    async fn post_doc(&self, typ: &str, id: &str, doc: &Value) -> Result<(), IndexError> {
        self.ensure_type_row(typ).await?;
        sqlx::query(
            "INSERT INTO idx_docs (index_name, type_name, doc_id, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (index_name, type_name, doc_id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_by_id(&self, typ: &str, id: &str) -> Result<Option<Value>, IndexError> {
        sqlx::query_scalar(
            "SELECT doc FROM idx_docs
             WHERE index_name = $1 AND type_name = $2 AND doc_id = $3",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn delete_by_id(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        let result = sqlx::query(
            "DELETE FROM idx_docs WHERE index_name = $1 AND type_name = $2 AND doc_id = $3",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn doc_exists(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM idx_docs
             WHERE index_name = $1 AND type_name = $2 AND doc_id = $3)",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(exists)
    }

    async fn match_all(
        &self,
        typ: Option<&str>,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError> {
        let docs = match typ {
            Some(typ) => self.docs_of_type(typ).await?,
            None => {
                let rows = sqlx::query("SELECT doc FROM idx_docs WHERE index_name = $1")
                    .bind(&self.index)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(backend)?;
                rows.iter()
                    .map(|row| row.try_get::<Value, _>("doc").map_err(backend))
                    .collect::<Result<Vec<_>, _>>()?
            }
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
        let docs = self.docs_of_type(typ).await?;
        let matching = docs.into_iter().filter(|doc| compiled.matches(doc)).collect();
        Ok(sort_and_page(matching, page))
    }

    async fn filter_by_term(
        &self,
        typ: &str,
        field: &str,
        value: &Value,
        page: &Pagination,
    ) -> Result<SearchPage, IndexError> {
        let docs = self.docs_of_type(typ).await?;
        let matching = docs
            .into_iter()
            .filter(|doc| doc_field(doc, field) == Some(value))
            .collect();
        Ok(sort_and_page(matching, page))
    }

    #[tracing::instrument(skip_all, fields(index = %self.index, typ, id))]
    async fn add_percolator(&self, typ: &str, id: &str, query: &Value) -> Result<(), IndexError> {
        // Reject queries the matcher cannot evaluate before they are stored.
        Query::compile(query)?;
        self.ensure_type_row(typ).await?;
        sqlx::query(
            "INSERT INTO idx_percolators (index_name, type_name, perc_id, query)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (index_name, type_name, perc_id) DO UPDATE SET query = EXCLUDED.query",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .bind(query)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn remove_percolator(&self, typ: &str, id: &str) -> Result<bool, IndexError> {
        let result = sqlx::query(
            "DELETE FROM idx_percolators
             WHERE index_name = $1 AND type_name = $2 AND perc_id = $3",
        )
        .bind(&self.index)
        .bind(typ)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn percolate(&self, typ: &str, doc: &Value) -> Result<Vec<String>, IndexError> {
        let rows = sqlx::query(
            "SELECT perc_id, query FROM idx_percolators
             WHERE index_name = $1 AND type_name = $2 ORDER BY perc_id",
        )
        .bind(&self.index)
        .bind(typ)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut matches = Vec::new();
        for row in &rows {
            let id: String = row.try_get("perc_id").map_err(backend)?;
            let query: Value = row.try_get("query").map_err(backend)?;
            match Query::compile(&query) {
                Ok(compiled) if compiled.matches(doc) => matches.push(id),
                Ok(_) => {}
                Err(e) => {
                    // Validated on registration; a row that no longer
                    // compiles is skipped rather than failing the event.
                    tracing::warn!(percolator = %id, error = %e, "skipping stored percolator");
                }
            }
        }
        Ok(matches)
    }

    async fn flush(&self, _typ: &str) -> Result<(), IndexError> {
        // Committed writes are visible to subsequent queries.
        Ok(())
    }
}

fn backend(err: sqlx::Error) -> IndexError {
    IndexError::Backend(err.to_string())
}
