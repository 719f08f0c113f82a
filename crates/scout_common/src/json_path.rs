//! Never-panicking nested lookup over JSON documents.
//!
//! searx.space data is irregular enough that half the interesting fields may
//! be missing on any given entry. Every parser in this workspace goes through
//! these helpers so a partial document degrades to defaults instead of
//! aborting the refresh.

use serde_json::Value;

/// Descend `path` through nested objects. Returns `None` the moment any
/// segment is missing or a non-object is hit mid-path.
pub fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = doc;
    for key in path {
        cur = cur.get(key)?;
    }
    Some(cur)
}

/// String at `path`, or `default` when absent or not a string.
pub fn str_or(doc: &Value, path: &[&str], default: &str) -> String {
    lookup(doc, path)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Bool at `path`, or `default` when absent or not a bool.
pub fn bool_or(doc: &Value, path: &[&str], default: bool) -> bool {
    lookup(doc, path).and_then(Value::as_bool).unwrap_or(default)
}

/// Finite float at `path`, or `None`.
pub fn f64_at(doc: &Value, path: &[&str]) -> Option<f64> {
    lookup(doc, path)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}
