//! JSON envelope around every API call.
//!
//! Request parameters go out as a JSON object body. Responses come back
//! either empty (a valid "no content" success) or as a JSON document, which
//! is rejected as [`ApiError::ServerReported`] if it carries an `error`
//! field.

use crate::error::ApiError;
use serde_json::{Map, Value};

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The server answered with an empty body.
    NoContent,
    Json(Value),
}

impl Payload {
    pub fn is_no_content(&self) -> bool {
        matches!(self, Payload::NoContent)
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::NoContent => None,
            Payload::Json(v) => Some(v),
        }
    }
}

/// Serializes request parameters to the wire body.
pub fn encode_params(params: Option<&Value>) -> Vec<u8> {
    match params {
        // Value's Serialize impl never fails
        Some(value) => serde_json::to_vec(value).unwrap_or_default(),
        None => Vec::new(),
    }
}

pub fn decode(endpoint: &str, raw: &[u8]) -> Result<Payload, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::NoContent);
    }

    let value: Value = serde_json::from_slice(raw).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        body: String::from_utf8_lossy(raw).into_owned(),
        source,
    })?;

    if let Some(error) = value.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ApiError::ServerReported {
            endpoint: endpoint.to_string(),
            message,
        });
    }

    Ok(Payload::Json(value))
}

/// Pulls the array stored under `key` out of a collection response such as
/// `{"scans": [...]}`. A `null` array is an empty collection.
pub fn collection(endpoint: &str, payload: Payload, key: &str) -> Result<Vec<Value>, ApiError> {
    let mut object = object(endpoint, payload)?;
    match object.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(unexpected(
            endpoint,
            format!("`{}` is not an array but {}", key, type_name(&other)),
        )),
        None => Err(unexpected(endpoint, format!("missing `{}` array", key))),
    }
}

/// Requires the payload to be a JSON object.
pub fn object(endpoint: &str, payload: Payload) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Payload::Json(Value::Object(map)) => Ok(map),
        Payload::Json(other) => Err(unexpected(
            endpoint,
            format!("expected an object, got {}", type_name(&other)),
        )),
        Payload::NoContent => Err(unexpected(endpoint, "empty body".to_string())),
    }
}

fn unexpected(endpoint: &str, detail: String) -> ApiError {
    ApiError::UnexpectedShape {
        endpoint: endpoint.to_string(),
        detail,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
