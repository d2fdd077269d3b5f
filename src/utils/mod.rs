//! Utility functions and helpers.

pub mod http;

use serde_json::Value;

/// Recursively drop null mapping entries and null sequence elements.
///
/// Non-null scalars are returned untouched.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

/// Truthiness of a loosely-typed value: null, false, zero and empty
/// strings/sequences/mappings are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render an optional value as a CSV cell. Absent and null become empty.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Make a display name usable as a single path segment.
///
/// `None` when nothing usable is left: empty, `.` or `..`.
pub fn path_segment(name: &str) -> Option<String> {
    let segment: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    match segment.as_str() {
        "" | "." | ".." => None,
        _ => Some(segment),
    }
}
