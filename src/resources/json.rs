//! JSON helpers shared by the reconcilers.

use serde_json::{Map, Value};

use crate::error::{ResourceError, Result};

/// Returns `value` with every object's keys in sorted order.
#[must_use]
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compact, key-sorted serialization of a value.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value.clone()).to_string()
}

/// Canonical form of a JSON string. Invalid JSON is returned unchanged so the
/// caller can surface the parse error with its field name later.
#[must_use]
pub fn normalize_json(raw: &str) -> String {
    serde_json::from_str::<Value>(raw).map_or_else(|_| raw.to_string(), |v| canonical_string(&v))
}

/// Parses a JSON-encoded object property. Blank strings and `null` yield an
/// empty object.
///
/// # Errors
///
/// Returns [`ResourceError::InvalidJson`] naming `field` if the string is not
/// a JSON object.
pub fn parse_object(field: &str, raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(ResourceError::invalid_json(field, "expected a JSON object").into()),
        Err(e) => Err(ResourceError::invalid_json(field, e.to_string()).into()),
    }
}

/// Renders a value as a flat string: strings verbatim, anything else as
/// compact JSON.
#[must_use]
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_is_stable() {
        let once = normalize_json("{\"z\": {\"b\": 2, \"a\": 1}, \"a\": null}");
        assert_eq!(once, "{\"a\":null,\"z\":{\"a\":1,\"b\":2}}");
        assert_eq!(normalize_json(&once), once);
    }

    #[test]
    fn test_normalize_keeps_invalid_input() {
        assert_eq!(normalize_json("{not json"), "{not json");
    }

    #[test]
    fn test_parse_object() {
        assert!(parse_object("f", "").expect("blank").is_empty());
        assert!(parse_object("f", "null").expect("null").is_empty());
        assert_eq!(parse_object("f", "{\"a\":1}").expect("object")["a"], 1);

        let err = parse_object("default_attributes_json", "[1]").expect_err("array");
        assert_eq!(
            err.to_string(),
            "Resource error: default_attributes_json: expected a JSON object"
        );
        assert!(parse_object("f", "{").is_err());
    }

    #[test]
    fn test_flatten_value() {
        assert_eq!(flatten_value(&json!("text")), "text");
        assert_eq!(flatten_value(&json!(3)), "3");
        assert_eq!(flatten_value(&json!(true)), "true");
        assert_eq!(flatten_value(&json!(null)), "null");
        assert_eq!(flatten_value(&json!({ "b": 1, "a": [1] })), "{\"a\":[1],\"b\":1}");
    }
}
