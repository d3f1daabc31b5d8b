//! Lenient JSON body handling.
//!
//! Handlers read the raw body so model availability can be checked before
//! the payload is validated.

use axum::body::Bytes;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// The body as a JSON object, or `None` for anything else.
pub fn json_object(body: &Bytes) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// A present, non-null field that must be a string.
pub fn string_field(
    payload: &Map<String, Value>,
    name: &str,
    missing: &str,
) -> Result<String, ApiError> {
    match payload.get(name) {
        None | Some(Value::Null) => Err(ApiError::bad_request(missing)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ApiError::bad_request(format!("'{}' must be a string", name))),
    }
}
