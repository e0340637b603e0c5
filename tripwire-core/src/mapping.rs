//! Event-type mappings: scalar type tags, strict-schema construction, and
//! runtime validation of event data against a mapping.
//!
//! A mapping is a JSON tree whose leaves are type tags (`"integer"`,
//! `"string"`, `"[double]"`, …) and whose interior nodes group fields.
//! Publishing a mapping converts it into the index store's strict-schema
//! form; posting an event checks the payload against the mapping leaf by
//! leaf.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::geo;

/// Scalar type tags an event-type mapping may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingType {
    Integer,
    Long,
    Short,
    Byte,
    Double,
    Float,
    Boolean,
    String,
    Date,
    Binary,
    Ip,
    GeoPoint,
    GeoShape,
}

impl MappingType {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "integer" => MappingType::Integer,
            "long" => MappingType::Long,
            "short" => MappingType::Short,
            "byte" => MappingType::Byte,
            "double" => MappingType::Double,
            "float" => MappingType::Float,
            "boolean" => MappingType::Boolean,
            "string" => MappingType::String,
            "date" => MappingType::Date,
            "binary" => MappingType::Binary,
            "ip" => MappingType::Ip,
            "geo_point" => MappingType::GeoPoint,
            "geo_shape" => MappingType::GeoShape,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MappingType::Integer => "integer",
            MappingType::Long => "long",
            MappingType::Short => "short",
            MappingType::Byte => "byte",
            MappingType::Double => "double",
            MappingType::Float => "float",
            MappingType::Boolean => "boolean",
            MappingType::String => "string",
            MappingType::Date => "date",
            MappingType::Binary => "binary",
            MappingType::Ip => "ip",
            MappingType::GeoPoint => "geo_point",
            MappingType::GeoShape => "geo_shape",
        }
    }

    /// Geo-typed fields are tolerated absent from event data and excluded
    /// from the set comparison.
    pub fn is_geo(self) -> bool {
        matches!(self, MappingType::GeoPoint | MappingType::GeoShape)
    }
}

/// A declared field type: a scalar tag, optionally array-wrapped
/// (`"[integer]"` in the mapping source).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub scalar: MappingType,
    pub array: bool,
}

impl FieldType {
    /// Parse a leaf tag, stripping the array brackets if present.
    pub fn parse(tag: &str) -> Result<Self, MappingError> {
        let (inner, array) = match tag.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some(inner) => (inner, true),
            None => (tag, false),
        };
        let scalar = MappingType::parse(inner)
            .ok_or_else(|| MappingError::UnknownTag(tag.to_owned()))?;
        Ok(FieldType { scalar, array })
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.array {
            write!(f, "[{}]", self.scalar.as_str())
        } else {
            f.write_str(self.scalar.as_str())
        }
    }
}

/// Errors raised while interpreting a mapping tree.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MappingError {
    #[error("{0:?} was not recognized as a valid mapping type")]
    UnknownTag(String),
    #[error("mapping node {0:?} must be a type tag or a nested object")]
    BadNode(String),
    #[error("mapping root must be an object")]
    NotAnObject,
}

/// Translate a mapping tree into the index store's strict-schema form.
///
/// Every interior node is wrapped with `{"dynamic": "strict",
/// "properties": …}` and every leaf becomes `{"type": tag}` with array
/// brackets stripped; the whole tree sits under the type's `data` field so
/// the store rejects undeclared keys.
pub fn build_strict_schema(type_name: &str, mapping: &Value) -> Result<Value, MappingError> {
    let tree = visit_node(mapping.as_object().ok_or(MappingError::NotAnObject)?)?;
    Ok(json!({
        type_name: {
            "properties": {
                "data": {
                    "dynamic": "strict",
                    "properties": tree,
                }
            }
        }
    }))
}

fn visit_node(node: &Map<String, Value>) -> Result<Value, MappingError> {
    let mut out = Map::new();
    for (key, value) in node {
        match value {
            Value::String(tag) => {
                let field = FieldType::parse(tag)?;
                out.insert(key.clone(), json!({ "type": field.scalar.as_str() }));
            }
            Value::Object(subtree) => {
                out.insert(
                    key.clone(),
                    json!({
                        "dynamic": "strict",
                        "properties": visit_node(subtree)?,
                    }),
                );
            }
            _ => return Err(MappingError::BadNode(key.clone())),
        }
    }
    Ok(Value::Object(out))
}

/// Flatten a mapping tree into dotted leaf paths.
pub fn flatten_mapping(mapping: &Value) -> Result<BTreeMap<String, FieldType>, MappingError> {
    let mut out = BTreeMap::new();
    let root = mapping.as_object().ok_or(MappingError::NotAnObject)?;
    flatten_mapping_node(root, "", &mut out)?;
    Ok(out)
}

fn flatten_mapping_node(
    node: &Map<String, Value>,
    prefix: &str,
    out: &mut BTreeMap<String, FieldType>,
) -> Result<(), MappingError> {
    for (key, value) in node {
        let path = join_path(prefix, key);
        match value {
            Value::String(tag) => {
                out.insert(path, FieldType::parse(tag)?);
            }
            Value::Object(subtree) => flatten_mapping_node(subtree, &path, out)?,
            _ => return Err(MappingError::BadNode(path)),
        }
    }
    Ok(())
}

/// Flatten event data into dotted leaf paths, skipping the given paths
/// (geo-typed fields are validated separately and never set-compared).
/// Arrays are leaves; objects recurse unless their path is skipped.
pub fn flatten_data<'a>(
    data: &'a Map<String, Value>,
    skip: &BTreeSet<String>,
) -> BTreeMap<String, &'a Value> {
    let mut out = BTreeMap::new();
    flatten_data_node(data, "", skip, &mut out);
    out
}

fn flatten_data_node<'a>(
    node: &'a Map<String, Value>,
    prefix: &str,
    skip: &BTreeSet<String>,
    out: &mut BTreeMap<String, &'a Value>,
) {
    for (key, value) in node {
        let path = join_path(prefix, key);
        if skip.contains(&path) {
            continue;
        }
        match value {
            Value::Object(subtree) => flatten_data_node(subtree, &path, skip, out),
            _ => {
                out.insert(path, value);
            }
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Validate one runtime value against its declared field type.
///
/// Returns the rejection reason on mismatch.
pub fn validate_value(field: &FieldType, value: &Value) -> Result<(), String> {
    if field.array {
        let Value::Array(items) = value else {
            return Err(format!("expected an array of {}", field.scalar.as_str()));
        };
        for (i, item) in items.iter().enumerate() {
            validate_scalar(field.scalar, item).map_err(|reason| format!("[{i}]: {reason}"))?;
        }
        return Ok(());
    }
    validate_scalar(field.scalar, value)
}

fn validate_scalar(scalar: MappingType, value: &Value) -> Result<(), String> {
    match scalar {
        MappingType::Byte => validate_int(value, i64::from(i8::MIN), i64::from(i8::MAX), "byte"),
        MappingType::Short => {
            validate_int(value, i64::from(i16::MIN), i64::from(i16::MAX), "short")
        }
        MappingType::Integer => {
            validate_int(value, i64::from(i32::MIN), i64::from(i32::MAX), "integer")
        }
        MappingType::Long => validate_int(value, i64::MIN, i64::MAX, "long"),
        MappingType::Double | MappingType::Float => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("expected a {}", scalar.as_str()))
            }
        }
        MappingType::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err("expected a boolean".to_owned())
            }
        }
        MappingType::String | MappingType::Binary => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("expected a {}", scalar.as_str()))
            }
        }
        MappingType::Date => {
            let Some(s) = value.as_str() else {
                return Err("expected an RFC-3339 date string".to_owned());
            };
            OffsetDateTime::parse(s, &Rfc3339)
                .map(|_| ())
                .map_err(|e| format!("not an RFC-3339 date: {e}"))
        }
        MappingType::Ip => {
            let Some(s) = value.as_str() else {
                return Err("expected an IP address string".to_owned());
            };
            s.parse::<std::net::IpAddr>()
                .map(|_| ())
                .map_err(|e| format!("not an IP address: {e}"))
        }
        MappingType::GeoPoint => geo::validate_point(value),
        MappingType::GeoShape => geo::validate_shape(value),
    }
}

fn validate_int(value: &Value, min: i64, max: i64, tag: &str) -> Result<(), String> {
    let Some(n) = value.as_i64() else {
        return Err(format!("expected a {tag}"));
    };
    if n < min || n > max {
        return Err(format!("{n} is out of range for {tag}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_wraps_interior_nodes_strict() {
        let mapping = json!({
            "num": "integer",
            "tags": "[string]",
            "nested": { "inner": "double" },
        });
        let schema = build_strict_schema("MyType", &mapping).unwrap();
        let data = &schema["MyType"]["properties"]["data"];
        assert_eq!(data["dynamic"], "strict");
        assert_eq!(data["properties"]["num"]["type"], "integer");
        // array brackets are stripped in the published schema
        assert_eq!(data["properties"]["tags"]["type"], "string");
        assert_eq!(data["properties"]["nested"]["dynamic"], "strict");
        assert_eq!(
            data["properties"]["nested"]["properties"]["inner"]["type"],
            "double"
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mapping = json!({ "num": "quaternion" });
        assert!(matches!(
            build_strict_schema("T", &mapping),
            Err(MappingError::UnknownTag(_))
        ));
    }

    #[test]
    fn flatten_uses_dotted_paths() {
        let mapping = json!({ "a": "integer", "b": { "c": "string", "d": "geo_point" } });
        let leaves = flatten_mapping(&mapping).unwrap();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves["a"].scalar, MappingType::Integer);
        assert_eq!(leaves["b.c"].scalar, MappingType::String);
        assert!(leaves["b.d"].scalar.is_geo());
    }

    #[test]
    fn flatten_data_skips_geo_paths() {
        let data = json!({
            "a": 1,
            "b": { "c": "x", "d": { "lon": 1.0, "lat": 2.0 } },
        });
        let skip: BTreeSet<String> = ["b.d".to_owned()].into();
        let leaves = flatten_data(data.as_object().unwrap(), &skip);
        assert_eq!(
            leaves.keys().cloned().collect::<Vec<_>>(),
            vec!["a".to_owned(), "b.c".to_owned()]
        );
    }

    #[test]
    fn integer_widths_are_enforced() {
        let byte = FieldType::parse("byte").unwrap();
        assert!(validate_value(&byte, &json!(17)).is_ok());
        assert!(validate_value(&byte, &json!(400)).is_err());

        let short = FieldType::parse("short").unwrap();
        assert!(validate_value(&short, &json!(-30000)).is_ok());
        assert!(validate_value(&short, &json!(70000)).is_err());

        let long = FieldType::parse("long").unwrap();
        assert!(validate_value(&long, &json!(1_i64 << 40)).is_ok());
        assert!(validate_value(&long, &json!(1.5)).is_err());
    }

    #[test]
    fn strict_booleans_and_strings() {
        let b = FieldType::parse("boolean").unwrap();
        assert!(validate_value(&b, &json!(true)).is_ok());
        assert!(validate_value(&b, &json!("true")).is_err());

        let s = FieldType::parse("string").unwrap();
        assert!(validate_value(&s, &json!("quick")).is_ok());
        assert!(validate_value(&s, &json!(17)).is_err());
    }

    #[test]
    fn dates_parse_rfc3339() {
        let d = FieldType::parse("date").unwrap();
        assert!(validate_value(&d, &json!("2016-05-02T12:00:00Z")).is_ok());
        assert!(validate_value(&d, &json!("last tuesday")).is_err());
    }

    #[test]
    fn ip_addresses_parse() {
        let ip = FieldType::parse("ip").unwrap();
        assert!(validate_value(&ip, &json!("10.0.0.1")).is_ok());
        assert!(validate_value(&ip, &json!("::1")).is_ok());
        assert!(validate_value(&ip, &json!("300.1.2.3")).is_err());
    }

    #[test]
    fn arrays_validate_every_element() {
        let arr = FieldType::parse("[integer]").unwrap();
        assert!(validate_value(&arr, &json!([1, 2, 3])).is_ok());
        assert!(validate_value(&arr, &json!([1, "two"])).is_err());
        assert!(validate_value(&arr, &json!(1)).is_err());
    }
}
