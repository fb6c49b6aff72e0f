use crate::error::HydrationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server metadata from `GET /server/properties?json=1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerProperties {
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default)]
    pub server_uuid: Option<String>,
    #[serde(default)]
    pub nessus_type: Option<String>,
    #[serde(default)]
    pub nessus_ui_version: Option<String>,
    #[serde(default)]
    pub loaded_plugin_set: Option<String>,
    #[serde(default)]
    pub plugin_set: Option<String>,
    #[serde(default)]
    pub expiration: Option<i64>,
    #[serde(default)]
    pub idle_timeout: Option<Value>,
    #[serde(default)]
    pub scanner_boottime: Option<i64>,
    #[serde(default, deserialize_with = "super::or_default")]
    pub notifications: Vec<Value>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

impl ServerProperties {
    pub fn from_record(record: Map<String, Value>) -> Result<Self, HydrationError> {
        serde_json::from_value(Value::Object(record))
            .map_err(|e| HydrationError::from_serde("server properties", e))
    }
}

/// Opaque settings object (mail, proxy), kept as the server sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
