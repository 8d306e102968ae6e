//! Pure functions for moving resolver results in and out of the store.
//!
//! Values are stored as JSON text so cached entries stay readable from
//! `redis-cli` and interoperable with other clients of the same store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{CacheError, Result};

/// Returns true if `value` carries nothing worth caching.
///
/// `null`, the empty string, `{}` and `[]` are empty. Numbers and booleans
/// are never empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Serializes `value` for storage.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Serializes `value` for storage, or returns `None` if it is empty.
pub fn encode_if_present<T: Serialize + ?Sized>(value: &T) -> Result<Option<String>> {
    let json = serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    if is_empty_value(&json) {
        return Ok(None);
    }
    encode_value(&json).map(Some)
}

/// Deserializes a stored JSON string.
pub fn decode_value<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| CacheError::Serialization(e.to_string()))
}
