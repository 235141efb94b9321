//! Decoded telemetry pings.
//!
//! A ping is the field table of one decoded frame. Values keep the scalar
//! type they were declared with on the wire; accessors coerce them and
//! report mismatches as [`Error::FieldType`] instead of panicking.

use crate::error::{Error, Result};
use crate::id::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field carrying the client identity.
pub const CLIENT_ID_FIELD: &str = "clientId";

/// Field carrying the client-side creation time (nanoseconds since epoch).
pub const CREATION_TIMESTAMP_FIELD: &str = "creationTimestamp";

/// A dynamically typed ping field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Str(String),
    Blob(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    /// Name of the variant, used in coercion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Blob(_) => "bytes",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "double",
            FieldValue::Bool(_) => "bool",
        }
    }

    /// Text view of the value. Blobs are accepted when they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::Blob(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// One decoded telemetry submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub fields: BTreeMap<String, FieldValue>,
}

impl Ping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text field, `Ok(None)` when absent, error when present with another type.
    pub fn str_field(&self, name: &str) -> Result<Option<&str>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| Error::FieldType {
                field: name.to_string(),
                expected: "string",
                actual: value.type_name(),
            }),
        }
    }

    /// Numeric field, `Ok(None)` when absent, error when present with another type.
    pub fn f64_field(&self, name: &str) -> Result<Option<f64>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| Error::FieldType {
                field: name.to_string(),
                expected: "double",
                actual: value.type_name(),
            }),
        }
    }

    /// The client id, if the ping carries a usable one.
    pub fn client_id(&self) -> Option<ClientId> {
        self.fields
            .get(CLIENT_ID_FIELD)
            .and_then(FieldValue::as_str)
            .and_then(ClientId::parse)
    }

    /// The creation timestamp, if present and numeric.
    pub fn creation_timestamp(&self) -> Option<f64> {
        self.fields
            .get(CREATION_TIMESTAMP_FIELD)
            .and_then(FieldValue::as_f64)
            .filter(|v| !v.is_nan())
    }
}
