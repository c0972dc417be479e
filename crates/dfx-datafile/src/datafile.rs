//! The configuration artifact itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An immutable datafile: the raw JSON tree of feature/experiment definitions.
///
/// Serializes transparently as its content, so `GET /v1/datafile` returns
/// exactly what was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datafile {
    content: Value,
}

impl Datafile {
    pub fn new(content: Value) -> Self {
        Self { content }
    }

    /// The `{}` stand-in handed to requests before anything has loaded.
    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    pub fn parse(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw).map(Self::new)
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Embedded `revision` field, if any. Numeric revisions are rendered as strings.
    pub fn revision(&self) -> Option<String> {
        match self.content.get("revision")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.content {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    /// Two-space indented JSON.
    pub fn to_pretty_json(&self) -> String {
        // Serializing a `Value` cannot fail.
        serde_json::to_string_pretty(&self.content).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<Value> for Datafile {
    fn from(content: Value) -> Self {
        Self::new(content)
    }
}
