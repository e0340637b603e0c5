//! Standing-query documents: compilation and in-process evaluation.
//!
//! The engine does not own a search backend's matcher; it honors the
//! set-valued contract "return exactly the ids of queries whose condition
//! holds" by compiling each registered query document once and evaluating
//! it against candidate documents at event time.
//!
//! Supported constructs: `match_all`, `match`, `term`, `range`
//! (`gt`/`gte`/`lt`/`lte`), `exists`, and `bool` with
//! `must`/`filter`/`should`/`must_not` clauses. An outer `{"query": …}`
//! wrapper is unwrapped. Field paths are dotted; a path that misses at the
//! document root is retried under the `data` sub-object, so trigger
//! authors may write either `num` or `data.num`.

use std::cmp::Ordering;

use serde_json::Value;

/// A query document that could not be compiled.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid query: {0}")]
pub struct QueryError(pub String);

/// A compiled standing query.
#[derive(Debug, Clone)]
pub enum Query {
    MatchAll,
    Match { field: String, value: Value },
    Term { field: String, value: Value },
    Range { field: String, bounds: Bounds },
    Exists { field: String },
    Bool(BoolClauses),
}

#[derive(Debug, Clone, Default)]
pub struct Bounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct BoolClauses {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
}

impl Query {
    /// Compile a query document, unwrapping an outer `{"query": …}`.
    pub fn compile(doc: &Value) -> Result<Self, QueryError> {
        let obj = doc
            .as_object()
            .ok_or_else(|| QueryError("query must be an object".into()))?;
        if let Some(inner) = obj.get("query") {
            if obj.len() != 1 {
                return Err(QueryError(
                    "a query wrapper must carry nothing else".into(),
                ));
            }
            return Self::compile_body(inner);
        }
        Self::compile_body(doc)
    }

    fn compile_body(doc: &Value) -> Result<Self, QueryError> {
        let obj = doc
            .as_object()
            .ok_or_else(|| QueryError("query body must be an object".into()))?;
        let (kind, body) = match obj.iter().next() {
            Some(entry) if obj.len() == 1 => entry,
            _ => {
                return Err(QueryError(
                    "query body must hold exactly one construct".into(),
                ));
            }
        };

        match kind.as_str() {
            "match_all" => Ok(Query::MatchAll),
            "match" => {
                let (field, value) = single_field(body, "match")?;
                // {"match": {"f": {"query": v}}} is accepted alongside the
                // short form.
                let value = match value.as_object().and_then(|o| o.get("query")) {
                    Some(inner) => inner.clone(),
                    None => value.clone(),
                };
                Ok(Query::Match {
                    field: field.to_owned(),
                    value,
                })
            }
            "term" => {
                let (field, value) = single_field(body, "term")?;
                let value = match value.as_object().and_then(|o| o.get("value")) {
                    Some(inner) => inner.clone(),
                    None => value.clone(),
                };
                Ok(Query::Term {
                    field: field.to_owned(),
                    value,
                })
            }
            "range" => {
                let (field, body) = single_field(body, "range")?;
                let body = body
                    .as_object()
                    .ok_or_else(|| QueryError("range bounds must be an object".into()))?;
                let mut bounds = Bounds::default();
                for (op, value) in body {
                    match op.as_str() {
                        "gt" => bounds.gt = Some(value.clone()),
                        "gte" => bounds.gte = Some(value.clone()),
                        "lt" => bounds.lt = Some(value.clone()),
                        "lte" => bounds.lte = Some(value.clone()),
                        other => {
                            return Err(QueryError(format!("{other:?} is not a range bound")));
                        }
                    }
                }
                Ok(Query::Range {
                    field: field.to_owned(),
                    bounds,
                })
            }
            "exists" => {
                let field = body
                    .as_object()
                    .and_then(|o| o.get("field"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| QueryError("exists needs a field name".into()))?;
                Ok(Query::Exists {
                    field: field.to_owned(),
                })
            }
            "bool" => {
                let body = body
                    .as_object()
                    .ok_or_else(|| QueryError("bool clauses must be an object".into()))?;
                let mut clauses = BoolClauses::default();
                for (name, value) in body {
                    let target = match name.as_str() {
                        "must" => &mut clauses.must,
                        "filter" => &mut clauses.filter,
                        "should" => &mut clauses.should,
                        "must_not" => &mut clauses.must_not,
                        other => {
                            return Err(QueryError(format!("{other:?} is not a bool clause")));
                        }
                    };
                    match value {
                        Value::Array(members) => {
                            for member in members {
                                target.push(Self::compile_body(member)?);
                            }
                        }
                        single => target.push(Self::compile_body(single)?),
                    }
                }
                Ok(Query::Bool(clauses))
            }
            other => Err(QueryError(format!("{other:?} is not supported"))),
        }
    }

    /// Evaluate this query against one document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Match { field, value } => {
                lookup(doc, field).is_some_and(|v| match_value(v, value))
            }
            Query::Term { field, value } => {
                lookup(doc, field).is_some_and(|v| term_value(v, value))
            }
            Query::Range { field, bounds } => {
                lookup(doc, field).is_some_and(|v| bounds.contain(v))
            }
            Query::Exists { field } => lookup(doc, field).is_some(),
            Query::Bool(clauses) => {
                if !clauses.must.iter().all(|q| q.matches(doc)) {
                    return false;
                }
                if !clauses.filter.iter().all(|q| q.matches(doc)) {
                    return false;
                }
                if clauses.must_not.iter().any(|q| q.matches(doc)) {
                    return false;
                }
                // should is only required when it is the sole positive clause
                if clauses.must.is_empty()
                    && clauses.filter.is_empty()
                    && !clauses.should.is_empty()
                {
                    return clauses.should.iter().any(|q| q.matches(doc));
                }
                true
            }
        }
    }
}

impl Bounds {
    fn contain(&self, value: &Value) -> bool {
        let checks = [
            (&self.gt, Ordering::Greater, false),
            (&self.gte, Ordering::Greater, true),
            (&self.lt, Ordering::Less, false),
            (&self.lte, Ordering::Less, true),
        ];
        for (bound, wanted, or_equal) in checks {
            if let Some(bound) = bound {
                match compare(value, bound) {
                    Some(ord) if ord == wanted => {}
                    Some(Ordering::Equal) if or_equal => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

fn single_field<'v>(body: &'v Value, kind: &str) -> Result<(&'v String, &'v Value), QueryError> {
    let obj = body
        .as_object()
        .ok_or_else(|| QueryError(format!("{kind} body must be an object")))?;
    match obj.iter().next() {
        Some(entry) if obj.len() == 1 => Ok(entry),
        _ => Err(QueryError(format!("{kind} takes exactly one field"))),
    }
}

/// Resolve a dotted path; on a root miss, retry under `data`.
fn lookup<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    descend(doc, path).or_else(|| doc.get("data").and_then(|data| descend(data, path)))
}

fn descend<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    let mut cursor = doc;
    for step in path.split('.') {
        cursor = cursor.as_object()?.get(step)?;
    }
    Some(cursor)
}

/// `match` semantics: strings compare by lowercase token containment,
/// everything else by equality; an array field matches when any element
/// does.
fn match_value(field: &Value, query: &Value) -> bool {
    if let Value::Array(items) = field {
        return items.iter().any(|item| match_value(item, query));
    }
    match (field, query) {
        (Value::String(f), Value::String(q)) => {
            let field_tokens: Vec<String> = f
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect();
            let mut query_tokens = q.split_whitespace().map(|t| t.to_lowercase()).peekable();
            if query_tokens.peek().is_none() {
                return false;
            }
            query_tokens.all(|t| field_tokens.contains(&t))
        }
        _ => eq_value(field, query),
    }
}

/// `term` semantics: strict equality; an array field matches when any
/// element equals the queried value.
fn term_value(field: &Value, query: &Value) -> bool {
    if let Value::Array(items) = field {
        return items.iter().any(|item| eq_value(item, query));
    }
    eq_value(field, query)
}

fn eq_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => xi == yi,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiles(doc: serde_json::Value) -> Query {
        Query::compile(&doc).unwrap()
    }

    #[test]
    fn match_on_numbers_is_equality() {
        let q = compiles(json!({"match": {"num": 17}}));
        assert!(q.matches(&json!({"data": {"num": 17}})));
        assert!(!q.matches(&json!({"data": {"num": 18}})));
    }

    #[test]
    fn match_on_strings_is_token_containment() {
        let q = compiles(json!({"match": {"str": "Quick"}}));
        assert!(q.matches(&json!({"data": {"str": "the quick brown fox"}})));
        assert!(!q.matches(&json!({"data": {"str": "slow red fox"}})));
    }

    #[test]
    fn term_is_strict() {
        let q = compiles(json!({"term": {"str": "quick"}}));
        assert!(q.matches(&json!({"data": {"str": "quick"}})));
        assert!(!q.matches(&json!({"data": {"str": "the quick fox"}})));
    }

    #[test]
    fn field_paths_resolve_with_and_without_data_prefix() {
        let bare = compiles(json!({"match": {"num": 17}}));
        let prefixed = compiles(json!({"match": {"data.num": 17}}));
        let doc = json!({"data": {"num": 17}});
        assert!(bare.matches(&doc));
        assert!(prefixed.matches(&doc));
    }

    #[test]
    fn range_bounds() {
        let q = compiles(json!({"range": {"num": {"gte": 10, "lt": 20}}}));
        assert!(q.matches(&json!({"data": {"num": 10}})));
        assert!(q.matches(&json!({"data": {"num": 19}})));
        assert!(!q.matches(&json!({"data": {"num": 20}})));
        assert!(!q.matches(&json!({"data": {"num": 9}})));
    }

    #[test]
    fn bool_clauses_combine() {
        let q = compiles(json!({
            "bool": {
                "must": [{"match": {"num": 17}}],
                "must_not": [{"term": {"str": "skip"}}],
            }
        }));
        assert!(q.matches(&json!({"data": {"num": 17, "str": "go"}})));
        assert!(!q.matches(&json!({"data": {"num": 17, "str": "skip"}})));
        assert!(!q.matches(&json!({"data": {"num": 18, "str": "go"}})));
    }

    #[test]
    fn bare_should_requires_one_match() {
        let q = compiles(json!({
            "bool": {
                "should": [{"match": {"num": 1}}, {"match": {"num": 2}}],
            }
        }));
        assert!(q.matches(&json!({"data": {"num": 2}})));
        assert!(!q.matches(&json!({"data": {"num": 3}})));
    }

    #[test]
    fn query_wrapper_unwraps() {
        let q = compiles(json!({"query": {"match": {"num": 17}}}));
        assert!(q.matches(&json!({"data": {"num": 17}})));
    }

    #[test]
    fn exists_checks_presence() {
        let q = compiles(json!({"exists": {"field": "str"}}));
        assert!(q.matches(&json!({"data": {"str": "here"}})));
        assert!(!q.matches(&json!({"data": {"num": 1}})));
    }

    #[test]
    fn unsupported_constructs_fail_to_compile() {
        assert!(Query::compile(&json!({"fuzzy": {"str": "qick"}})).is_err());
        assert!(Query::compile(&json!("match everything")).is_err());
        assert!(Query::compile(&json!({"range": {"num": {"between": [1, 2]}}})).is_err());
    }

    #[test]
    fn array_fields_match_any_element() {
        let q = compiles(json!({"term": {"tags": "alpha"}}));
        assert!(q.matches(&json!({"data": {"tags": ["beta", "alpha"]}})));
        assert!(!q.matches(&json!({"data": {"tags": ["beta"]}})));
    }
}
