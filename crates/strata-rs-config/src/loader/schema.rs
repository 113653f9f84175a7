//! Schema checks for Strata JSON5 configuration.
//!
//! Runs on raw JSON values so errors can name the layer and the exact path.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate one config layer (or the merged config) against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, &["$schema", "storage", "window", "pagination"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("window") {
        validate_window(value, layer, "window")?;
    }
    if let Some(value) = map.get("pagination") {
        validate_pagination(value, layer, "pagination")?;
    }
    Ok(())
}

fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["backend", "path"], layer, path)?;

    if let Some(value) = map.get("backend") {
        let backend_path = join_path(path, "backend");
        match value.as_str() {
            Some("memory" | "file") => {}
            Some(_) => {
                return Err(invalid_field(
                    layer,
                    &backend_path,
                    "expected \"memory\" or \"file\"",
                ));
            }
            None => return Err(invalid_field(layer, &backend_path, "expected string")),
        }
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

fn validate_window(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["last_messages"], layer, path)?;

    if let Some(value) = map.get("last_messages") {
        let limit_path = join_path(path, "last_messages");
        if !(value.is_u64() || *value == Value::Bool(false)) {
            return Err(invalid_field(
                layer,
                &limit_path,
                "expected non-negative integer or false",
            ));
        }
    }
    Ok(())
}

fn validate_pagination(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let keys = ["thread_page_size", "trace_page_size", "clear_page_size"];
    ensure_allowed_keys(map, &keys, layer, path)?;

    for key in keys {
        if let Some(value) = map.get(key) {
            expect_positive(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_positive(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value.as_u64() {
        Some(0) => Err(invalid_field(layer, path, "must be greater than zero")),
        Some(_) => Ok(()),
        None => Err(invalid_field(layer, path, "expected positive integer")),
    }
}

/// Reject keys outside `allowed`.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}: {path}"),
        message: message.to_string(),
    }
}
