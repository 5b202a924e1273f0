//! Operations on the in-memory JSON tree.
//!
//! Nulls and empty objects never exist in the tree: writing them deletes the
//! location, and deleting the last child of an object deletes the object.

use record_api::{is_server_timestamp, RecordPath, StoreError};
use serde_json::{Map, Value};

pub(crate) fn empty() -> Value {
    Value::Object(Map::new())
}

/// Value at `path`, `None` when absent.
pub(crate) fn get<'a>(root: &'a Value, path: &RecordPath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    if is_empty(node) {
        None
    } else {
        Some(node)
    }
}

/// Object children of `path`, `None` when absent or not an object.
pub(crate) fn children<'a>(root: &'a Value, path: &RecordPath) -> Option<&'a Map<String, Value>> {
    get(root, path).and_then(Value::as_object)
}

/// Location to save so that writing `path` can be undone: the highest scalar
/// on the way to `path` (writing below it replaces it with an object), or
/// `path` itself.
pub(crate) fn restore_point(root: &Value, path: &RecordPath) -> RecordPath {
    let mut node = root;
    let mut at = RecordPath::root();
    for segment in path.segments() {
        match node {
            Value::Object(map) => match map.get(segment) {
                Some(child) => node = child,
                None => return path.clone(),
            },
            _ if at.is_root() => return path.clone(),
            _ => return at,
        }
        at = match at.child(segment) {
            Ok(child) => child,
            Err(_) => return path.clone(),
        };
    }
    path.clone()
}

/// Replace the value at `path`. `None` deletes it.
pub(crate) fn set(root: &mut Value, path: &RecordPath, value: Option<Value>) {
    let value = value.and_then(normalize);
    let segments: Vec<&str> = path.segments().collect();
    if segments.is_empty() {
        *root = value.unwrap_or_else(empty);
        return;
    }
    set_in(root, &segments, value);
}

fn set_in(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = empty();
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert(head.to_string(), v);
            }
            None => {
                map.remove(*head);
            }
        }
        return;
    }
    match value {
        Some(v) => {
            let child = map.entry(head.to_string()).or_insert_with(empty);
            set_in(child, rest, Some(v));
        }
        None => {
            let prune = match map.get_mut(*head) {
                Some(child) => {
                    set_in(child, rest, None);
                    is_empty(child)
                }
                None => false,
            };
            if prune {
                map.remove(*head);
            }
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Strip nulls and empty objects. `None` when nothing is left.
pub(crate) fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

/// Replace every server timestamp placeholder with `now`.
pub(crate) fn resolve_server_values(value: &mut Value, now: i64) -> bool {
    if is_server_timestamp(value) {
        *value = Value::from(now);
        return true;
    }
    match value {
        Value::Object(map) => {
            let mut replaced = false;
            for child in map.values_mut() {
                replaced |= resolve_server_values(child, now);
            }
            replaced
        }
        Value::Array(items) => {
            let mut replaced = false;
            for child in items.iter_mut() {
                replaced |= resolve_server_values(child, now);
            }
            replaced
        }
        _ => false,
    }
}

/// Check that every object key can be addressed as a path segment.
pub(crate) fn validate_keys(value: &Value) -> Result<(), StoreError> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            RecordPath::root().child(key)?;
            validate_keys(child)?;
        }
    }
    Ok(())
}

/// Flatten `value` stored at `base` into `(path, leaf)` pairs.
pub(crate) fn leaves(value: &Value, base: &RecordPath, out: &mut Vec<(RecordPath, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                if let Ok(path) = base.child(key) {
                    leaves(child, &path, out);
                }
            }
        }
        _ => out.push((base.clone(), value.clone())),
    }
}
