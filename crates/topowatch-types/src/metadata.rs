//! Open metadata maps and the recursive empty-value policy.
//!
//! A value is *empty* iff it is `null`, a string that is empty or only
//! whitespace, an array with no elements, or an object with no keys.
//! Stripping is applied bottom-up, so an object whose every member is
//! empty collapses to `{}` and is then removed by its parent.

use std::collections::BTreeMap;

use serde_json::Value;

/// Open key/value metadata attached to nodes and edges.
pub type Metadata = BTreeMap<String, Value>;

/// Return `true` if `value` is empty at the top level.
///
/// This does not look inside containers: `{"a": null}` is not empty
/// until it has been through [`strip_empty`].
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Recursively remove empty values, returning `None` if nothing remains.
///
/// Objects lose their empty members, arrays lose their empty elements,
/// and a container left with no content is itself empty.
pub fn strip_empty(value: Value) -> Option<Value> {
    let stripped = match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(key, inner)| strip_empty(inner).map(|v| (key, v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().filter_map(strip_empty).collect()),
        other => other,
    };
    if is_empty_value(&stripped) {
        None
    } else {
        Some(stripped)
    }
}

/// Apply [`strip_empty`] to every entry of a metadata map.
pub fn strip_empty_map(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .filter_map(|(key, value)| strip_empty(value).map(|v| (key, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("   ")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!("x")));
    }

    #[test]
    fn nested_objects_collapse() {
        let input = json!({
            "vendor": "Cisco",
            "blank": "",
            "list": [],
            "nested": {"a": null, "b": {"c": " "}},
            "ports": [null, 22, ""],
            "deep": {"keep": {"value": 1}, "drop": {}}
        });
        let out = strip_empty(input);
        assert_eq!(
            out,
            Some(json!({
                "vendor": "Cisco",
                "ports": [22],
                "deep": {"keep": {"value": 1}}
            }))
        );
    }

    #[test]
    fn everything_empty_yields_none() {
        assert_eq!(strip_empty(json!({"a": {"b": [null, ""]}})), None);
    }

    #[test]
    fn map_stripping_keeps_non_empty_keys() {
        let mut map = Metadata::new();
        map.insert("cpu".to_owned(), json!(12.5));
        map.insert("model".to_owned(), json!(""));
        map.insert("location".to_owned(), json!({"rack": null}));
        let out = strip_empty_map(map);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("cpu"), Some(&json!(12.5)));
    }
}
