//! Protobuf envelope types.
//!
//! Hand-declared `prost` messages for the Heka framing: a small header that
//! carries the message length, and the message itself whose `fields` table
//! holds the ping's named, typed values.

use lv_common::{FieldValue, Ping};

/// Frame header.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(uint32, required, tag = "1")]
    pub message_length: u32,
}

/// Declared type of a field's values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    String = 0,
    Bytes = 1,
    Integer = 2,
    Double = 3,
    Bool = 4,
}

/// One named entry of the field table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Field {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(enumeration = "ValueType", optional, tag = "2")]
    pub value_type: Option<i32>,
    #[prost(string, optional, tag = "3")]
    pub representation: Option<String>,
    #[prost(string, repeated, tag = "4")]
    pub value_string: Vec<String>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub value_bytes: Vec<Vec<u8>>,
    #[prost(int64, repeated, packed = "true", tag = "6")]
    pub value_integer: Vec<i64>,
    #[prost(double, repeated, packed = "true", tag = "7")]
    pub value_double: Vec<f64>,
    #[prost(bool, repeated, packed = "true", tag = "8")]
    pub value_bool: Vec<bool>,
}

impl Field {
    /// First value, coerced to its declared type.
    ///
    /// `None` when the declared type is unknown or has no values.
    pub fn first_value(&self) -> Option<FieldValue> {
        let declared = ValueType::try_from(self.value_type.unwrap_or(0)).ok()?;
        match declared {
            ValueType::String => self.value_string.first().cloned().map(FieldValue::Str),
            ValueType::Bytes => self.value_bytes.first().cloned().map(FieldValue::Blob),
            ValueType::Integer => self.value_integer.first().copied().map(FieldValue::Int),
            ValueType::Double => self.value_double.first().copied().map(FieldValue::Float),
            ValueType::Bool => self.value_bool.first().copied().map(FieldValue::Bool),
        }
    }

    /// Single-valued field holding `value`.
    pub fn from_value(name: &str, value: &FieldValue) -> Self {
        let mut field = Field {
            name: name.to_string(),
            ..Field::default()
        };
        let declared = match value {
            FieldValue::Str(s) => {
                field.value_string.push(s.clone());
                ValueType::String
            }
            FieldValue::Blob(b) => {
                field.value_bytes.push(b.clone());
                ValueType::Bytes
            }
            FieldValue::Int(v) => {
                field.value_integer.push(*v);
                ValueType::Integer
            }
            FieldValue::Float(v) => {
                field.value_double.push(*v);
                ValueType::Double
            }
            FieldValue::Bool(v) => {
                field.value_bool.push(*v);
                ValueType::Bool
            }
        };
        field.value_type = Some(declared as i32);
        field
    }
}

/// Envelope message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(bytes = "vec", required, tag = "1")]
    pub uuid: Vec<u8>,
    #[prost(int64, required, tag = "2")]
    pub timestamp: i64,
    #[prost(string, optional, tag = "3")]
    pub r#type: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub logger: Option<String>,
    #[prost(int32, optional, tag = "5")]
    pub severity: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub payload: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub env_version: Option<String>,
    #[prost(int32, optional, tag = "8")]
    pub pid: Option<i32>,
    #[prost(string, optional, tag = "9")]
    pub hostname: Option<String>,
    #[prost(message, repeated, tag = "10")]
    pub fields: Vec<Field>,
}

impl Message {
    /// The field table as a ping. Later duplicates of a name win.
    pub fn into_ping(self) -> Ping {
        let mut ping = Ping::new();
        for field in &self.fields {
            if let Some(value) = field.first_value() {
                ping.insert(field.name.clone(), value);
            }
        }
        ping
    }

    pub fn from_ping(ping: &Ping, timestamp: i64) -> Self {
        Message {
            uuid: uuid::Uuid::new_v4().as_bytes().to_vec(),
            timestamp,
            r#type: Some("telemetry".to_string()),
            fields: ping
                .fields
                .iter()
                .map(|(name, value)| Field::from_value(name, value))
                .collect(),
            ..Message::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_follows_declared_type() {
        let field = Field {
            name: "creationTimestamp".into(),
            value_type: Some(ValueType::Double as i32),
            value_double: vec![1.5, 2.5],
            value_string: vec!["ignored".into()],
            ..Field::default()
        };
        assert_eq!(field.first_value(), Some(FieldValue::Float(1.5)));
    }

    #[test]
    fn missing_value_type_defaults_to_string() {
        let field = Field {
            name: "clientId".into(),
            value_string: vec!["abc".into()],
            ..Field::default()
        };
        assert_eq!(field.first_value(), Some(FieldValue::Str("abc".into())));
    }

    #[test]
    fn empty_or_unknown_fields_are_skipped() {
        let empty = Field {
            name: "x".into(),
            value_type: Some(ValueType::Integer as i32),
            ..Field::default()
        };
        assert_eq!(empty.first_value(), None);

        let unknown = Field {
            name: "x".into(),
            value_type: Some(42),
            value_integer: vec![1],
            ..Field::default()
        };
        assert_eq!(unknown.first_value(), None);
    }

    #[test]
    fn ping_survives_message_conversion() {
        let ping = Ping::new()
            .with("clientId", FieldValue::Str("abc".into()))
            .with("creationTimestamp", FieldValue::Float(1.0e18))
            .with("sampleId", FieldValue::Int(42))
            .with("blob", FieldValue::Blob(vec![1, 2, 3]))
            .with("e10s", FieldValue::Bool(true));
        let message = Message::from_ping(&ping, 7);
        assert_eq!(message.fields.len(), 5);
        assert_eq!(message.into_ping(), ping);
    }
}
