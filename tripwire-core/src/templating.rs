//! Job templating: `$field` placeholders resolved from event data.

use serde_json::{Map, Value};

/// Render a trigger's job against one event's data.
///
/// The job is flattened to its JSON string, then scanned once left to
/// right: at each `$` the longest data key that follows is substituted
/// with the textual rendering of its value. Substituted text is never
/// rescanned, so the pass is non-recursive, and `$foobar` always wins
/// over `$foo`. A `$name` matching no key is left as-is.
pub fn render_job(job: &Value, data: &Map<String, Value>) -> Result<String, serde_json::Error> {
    let source = serde_json::to_string(job)?;

    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = String::with_capacity(source.len());
    let mut rest = source.as_str();
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match keys.iter().find(|key| after.starts_with(key.as_str())) {
            Some(key) => {
                out.push_str(&render_value(&data[key.as_str()]));
                rest = &after[key.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// The textual rendering of one data value: numbers in canonical decimal,
/// booleans `true`/`false`, strings unquoted, nested structures as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        nested => nested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn fields_substitute_into_the_flattened_job() {
        let job = json!({"task": "process $file at $num"});
        let rendered =
            render_job(&job, &data(json!({"file": "in.tif", "num": 17}))).unwrap();
        assert_eq!(rendered, r#"{"task":"process in.tif at 17"}"#);
    }

    #[test]
    fn longer_keys_win_over_their_prefixes() {
        let job = json!({"task": "$foo and $foobar"});
        let rendered = render_job(&job, &data(json!({"foo": "A", "foobar": "B"}))).unwrap();
        assert_eq!(rendered, r#"{"task":"A and B"}"#);
    }

    #[test]
    fn unknown_placeholders_survive() {
        let job = json!({"task": "keep $unknown, pay $5"});
        let rendered = render_job(&job, &data(json!({"num": 1}))).unwrap();
        assert_eq!(rendered, r#"{"task":"keep $unknown, pay $5"}"#);
    }

    #[test]
    fn substitution_is_not_recursive() {
        // A substituted value containing a placeholder is left alone.
        let job = json!({"task": "$a"});
        let rendered = render_job(&job, &data(json!({"a": "$b", "b": "deep"}))).unwrap();
        assert_eq!(rendered, r#"{"task":"$b"}"#);
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let job = json!({"again": "$num", "first": "$num"});
        let rendered = render_job(&job, &data(json!({"num": 7}))).unwrap();
        assert_eq!(rendered, r#"{"again":"7","first":"7"}"#);
    }

    #[test]
    fn value_renderings() {
        assert_eq!(render_value(&json!("text")), "text");
        assert_eq!(render_value(&json!(3.5)), "3.5");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(null)), "null");
        assert_eq!(render_value(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }
}
