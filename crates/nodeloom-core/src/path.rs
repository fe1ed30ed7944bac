//! Dotted-path access into JSON values (`a.b.0.c`).
//!
//! Numeric segments index arrays. On reads, `*` matches every array index and
//! the result is an array of all matches. Writes create intermediate objects
//! as needed; an index equal to the array length appends.

use serde_json::{Map, Value};

/// Segment that matches any array index when reading.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,

    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("wildcard segments are only valid for reads: '{0}'")]
    WildcardWrite(String),

    #[error("cannot descend into {kind} at segment '{segment}' of '{path}'")]
    NotContainer {
        path: String,
        segment: String,
        kind: &'static str,
    },

    #[error("index '{segment}' is out of bounds in '{path}'")]
    IndexOutOfBounds { path: String, segment: String },
}

fn parse(path: &str) -> Result<Vec<&str>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(segments)
}

fn parse_for_write(path: &str) -> Result<Vec<&str>, PathError> {
    let segments = parse(path)?;
    if segments.contains(&WILDCARD) {
        return Err(PathError::WildcardWrite(path.to_string()));
    }
    Ok(segments)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn collect_matches(value: &Value, segments: &[&str], out: &mut Vec<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value.clone());
        return;
    };
    if *head == WILDCARD {
        if let Value::Array(items) = value {
            for item in items {
                collect_matches(item, rest, out);
            }
        }
        return;
    }
    if let Some(next) = step(value, head) {
        collect_matches(next, rest, out);
    }
}

// ---------------------------------------------------------------------------
// Value API
// ---------------------------------------------------------------------------

/// Read the value at `path`.
///
/// A path containing `*` yields `Some(array)` of every match, or `None` when
/// nothing matched.
pub fn get_path(root: &Value, path: &str) -> Result<Option<Value>, PathError> {
    let segments = parse(path)?;
    if segments.contains(&WILDCARD) {
        let mut matches = Vec::new();
        collect_matches(root, &segments, &mut matches);
        return Ok((!matches.is_empty()).then_some(Value::Array(matches)));
    }
    let mut current = root;
    for segment in &segments {
        match step(current, segment) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current.clone()))
}

pub fn has_path(root: &Value, path: &str) -> bool {
    matches!(get_path(root, path), Ok(Some(_)))
}

/// Write `value` at `path`, creating intermediate objects.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let segments = parse_for_write(path)?;
    let (last, parents) = segments.split_last().ok_or(PathError::Empty)?;

    let mut current = root;
    for segment in parents {
        current = descend_or_create(current, segment, path)?;
    }
    assign(current, last, value, path)
}

fn descend_or_create<'a>(
    value: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, PathError> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = array_index(segment, path)?;
            if index == items.len() {
                items.push(Value::Object(Map::new()));
            }
            items.get_mut(index).ok_or_else(|| PathError::IndexOutOfBounds {
                path: path.to_string(),
                segment: segment.to_string(),
            })
        }
        other => Err(PathError::NotContainer {
            path: path.to_string(),
            segment: segment.to_string(),
            kind: kind_of(other),
        }),
    }
}

fn assign(target: &mut Value, segment: &str, value: Value, path: &str) -> Result<(), PathError> {
    if target.is_null() {
        *target = Value::Object(Map::new());
    }
    match target {
        Value::Object(map) => {
            map.insert(segment.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = array_index(segment, path)?;
            if index < items.len() {
                items[index] = value;
                Ok(())
            } else if index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(PathError::IndexOutOfBounds {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        }
        other => Err(PathError::NotContainer {
            path: path.to_string(),
            segment: segment.to_string(),
            kind: kind_of(other),
        }),
    }
}

fn array_index(segment: &str, path: &str) -> Result<usize, PathError> {
    segment.parse::<usize>().map_err(|_| PathError::NotContainer {
        path: path.to_string(),
        segment: segment.to_string(),
        kind: "array",
    })
}

/// Remove the value at `path`, returning it. Missing paths are `Ok(None)`.
pub fn delete_path(root: &mut Value, path: &str) -> Result<Option<Value>, PathError> {
    let segments = parse_for_write(path)?;
    let (last, parents) = segments.split_last().ok_or(PathError::Empty)?;

    let mut current = root;
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(match current {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => Some(items.remove(i)),
            _ => None,
        },
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Node data helpers
// ---------------------------------------------------------------------------

/// Run a value-level path operation against a node's data map in place.
fn with_map<T>(map: &mut Map<String, Value>, f: impl FnOnce(&mut Value) -> T) -> T {
    let mut root = Value::Object(std::mem::take(map));
    let out = f(&mut root);
    if let Value::Object(inner) = root {
        *map = inner;
    }
    out
}

pub fn get_data_path(map: &Map<String, Value>, path: &str) -> Result<Option<Value>, PathError> {
    let segments = parse(path)?;
    let first = segments[0];
    if first == WILDCARD {
        return Ok(None);
    }
    match map.get(first) {
        None => Ok(None),
        Some(value) if segments.len() == 1 => Ok(Some(value.clone())),
        Some(value) => get_path(value, &segments[1..].join(".")),
    }
}

pub fn set_data_path(map: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), PathError> {
    with_map(map, |root| set_path(root, path, value))
}

pub fn delete_data_path(map: &mut Map<String, Value>, path: &str) -> Result<Option<Value>, PathError> {
    with_map(map, |root| delete_path(root, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_nested_and_indexed() {
        let doc = json!({ "a": { "b": [ { "c": 1 }, { "c": 2 } ] } });
        assert_eq!(get_path(&doc, "a.b.1.c").unwrap(), Some(json!(2)));
        assert_eq!(get_path(&doc, "a.x").unwrap(), None);
    }

    #[test]
    fn wildcard_collects_matches() {
        let doc = json!({ "items": [ { "v": 1 }, { "w": 0 }, { "v": 3 } ] });
        assert_eq!(get_path(&doc, "items.*.v").unwrap(), Some(json!([1, 3])));
        assert_eq!(get_path(&doc, "items.*.z").unwrap(), None);
    }

    #[test]
    fn set_creates_intermediates_and_appends() {
        let mut doc = json!({ "list": [1] });
        set_path(&mut doc, "a.b.c", json!(true)).unwrap();
        set_path(&mut doc, "list.1", json!(2)).unwrap();
        assert_eq!(doc, json!({ "a": { "b": { "c": true } }, "list": [1, 2] }));
        assert!(matches!(
            set_path(&mut doc, "list.5", json!(0)),
            Err(PathError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn set_rejects_wildcard_and_scalars() {
        let mut doc = json!({ "n": 1 });
        assert_eq!(
            set_path(&mut doc, "a.*", json!(1)),
            Err(PathError::WildcardWrite("a.*".to_string()))
        );
        assert!(matches!(
            set_path(&mut doc, "n.x", json!(1)),
            Err(PathError::NotContainer { kind: "number", .. })
        ));
    }

    #[test]
    fn delete_removes_and_reports() {
        let mut doc = json!({ "a": { "b": 1, "c": 2 } });
        assert_eq!(delete_path(&mut doc, "a.b").unwrap(), Some(json!(1)));
        assert_eq!(delete_path(&mut doc, "a.b").unwrap(), None);
        assert_eq!(doc, json!({ "a": { "c": 2 } }));
    }

    #[test]
    fn empty_paths_are_errors() {
        assert_eq!(get_path(&json!({}), ""), Err(PathError::Empty));
        assert!(matches!(get_path(&json!({}), "a..b"), Err(PathError::EmptySegment(_))));
    }

    #[test]
    fn data_map_helpers_work_in_place() {
        let mut map = Map::new();
        set_data_path(&mut map, "config.rate", json!(5)).unwrap();
        assert_eq!(get_data_path(&map, "config.rate").unwrap(), Some(json!(5)));
        assert_eq!(delete_data_path(&mut map, "config").unwrap(), Some(json!({ "rate": 5 })));
        assert!(map.is_empty());
    }
}
