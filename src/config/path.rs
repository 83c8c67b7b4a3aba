//! Dot-path access into a configuration tree
//!
//! Errors are plain strings; callers wrap them in the `ConfigError`
//! variant of their stage.

use serde_json::{Map, Value};

/// Get a value by dot-separated path
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Insert `value` at `path`, creating intermediate objects.
///
/// Fails if an intermediate segment exists and is not an object.
pub fn set_path(tree: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop().ok_or_else(|| "empty path".to_string())?;

    let mut current = tree;
    for (depth, part) in parts.iter().enumerate() {
        let map = current
            .as_object_mut()
            .ok_or_else(|| format!("'{}' is not an object", parts[..depth].join(".")))?;
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let map = current
        .as_object_mut()
        .ok_or_else(|| format!("'{}' is not an object", parts.join(".")))?;
    map.insert(last.to_string(), value);
    Ok(())
}

/// Value at `path`, or an error naming the path
pub fn require<'a>(tree: &'a Value, path: &str) -> Result<&'a Value, String> {
    match lookup(tree, path) {
        Some(Value::Null) | None => Err(format!("required field '{path}' is missing")),
        Some(value) => Ok(value),
    }
}

pub fn require_str<'a>(tree: &'a Value, path: &str) -> Result<&'a str, String> {
    require(tree, path)?
        .as_str()
        .ok_or_else(|| format!("field '{path}' must be a string"))
}

pub fn require_bool(tree: &Value, path: &str) -> Result<bool, String> {
    require(tree, path)?
        .as_bool()
        .ok_or_else(|| format!("field '{path}' must be a boolean"))
}

pub fn require_u64(tree: &Value, path: &str) -> Result<u64, String> {
    require(tree, path)?
        .as_u64()
        .ok_or_else(|| format!("field '{path}' must be an unsigned integer"))
}

pub fn require_object<'a>(tree: &'a Value, path: &str) -> Result<&'a Map<String, Value>, String> {
    require(tree, path)?
        .as_object()
        .ok_or_else(|| format!("field '{path}' must be a table"))
}

/// Array of strings at `path`
pub fn require_str_list(tree: &Value, path: &str) -> Result<Vec<String>, String> {
    require(tree, path)?
        .as_array()
        .ok_or_else(|| format!("field '{path}' must be a list"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("field '{path}' must only contain strings"))
        })
        .collect()
}

/// Optional non-empty string at `path`
pub fn optional_str<'a>(tree: &'a Value, path: &str) -> Option<&'a str> {
    lookup(tree, path)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
