//! `lumen-types` – shared data model for the Lumen bridge.
//!
//! Everything that crosses a crate boundary lives here: the canonical
//! [`Settings`] record produced by the normalizer, the [`FieldSpec`]s that
//! describe which fields a command recognises, the [`StatusSnapshot`] both
//! front-ends report, and the workspace-wide [`BridgeError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How a raw, string-typed query value is coerced before it may enter a
/// [`Settings`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Base-10 integer. Zero and non-numeric input are both treated as absent.
    Int,
    /// Exactly `"true"` or `"false"`.
    Bool,
    /// Six-character colour string such as `ff8800`.
    Color,
    /// Free-form string, included whenever present.
    Text,
    /// Calendar date or timestamp, stored as RFC 3339.
    Date,
}

/// A single field a command recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Which transport path an encoded message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Small device-configuration messages (`write_all`).
    Control,
    /// Larger payloads such as rendered images (`write_image`).
    Bulk,
}

/// Normalized, partially-populated settings for one command invocation.
///
/// Only fields that were present (and, on the query path, valid) are stored.
/// Nothing is defaulted here; defaulting is the device encoder's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.0.get(field).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Read-only `{connected, config}` projection returned by the request
/// front-end and published by the message front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub config: Value,
}

/// Workspace-wide error type spanning lookup, connection, encoding and broker
/// failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Encoding {command} failed: {details}")]
    Encode { command: String, details: String },

    #[error("Image render failed: {0}")]
    Render(String),

    #[error("Transport write failed: {0}")]
    Transport(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("HTTP server error: {0}")]
    Server(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
