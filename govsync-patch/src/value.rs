use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::PatchError;

/// A pointer to another remote object.
///
/// References are compared as a unit. Changing only the `name` still
/// replaces the whole reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    pub fn new(type_: &str, id: &str, name: Option<&str>) -> Self {
        Reference {
            type_: type_.to_string(),
            id: id.to_string(),
            name: name.map(str::to_string),
        }
    }
}

/// A free-form attribute value from the closed set of scalar kinds that
/// appear in attribute maps.
///
/// Deserialization tries the variants in declaration order, so an integer
/// that fits in 32 bits becomes `Int32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    StringList(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            AttributeValue::Int32(i) => Some(*i),
            _ => None,
        }
    }

    /// Widening accessor: `Int32` values are returned as well.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int32(i) => Some(i64::from(*i)),
            AttributeValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::StringList(l) => Some(l),
            _ => None,
        }
    }
}

/// A JSON document held as text, such as a workflow definition.
///
/// Two blobs are equal when they parse to the same structure; whitespace and
/// member order do not matter. A blob that does not parse only equals a blob
/// with the identical text.
///
/// On the wire the blob is sent as structured JSON, so serializing a
/// malformed blob fails.
#[derive(Debug, Clone)]
pub struct JsonBlob {
    text: String,
}

impl JsonBlob {
    pub fn new(text: impl Into<String>) -> Self {
        JsonBlob { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parse(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.text)
    }

    /// Parse the blob held by the field at `path`.
    pub fn parse_field(&self, path: &str) -> Result<Value, PatchError> {
        self.parse().map_err(|e| PatchError::malformed(path, e))
    }
}

impl From<Value> for JsonBlob {
    fn from(value: Value) -> Self {
        JsonBlob {
            text: value.to_string(),
        }
    }
}

impl PartialEq for JsonBlob {
    fn eq(&self, other: &Self) -> bool {
        match (self.parse(), other.parse()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.text == other.text,
        }
    }
}

impl Serialize for JsonBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parse()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonBlob {
    /// Accepts either a string holding JSON text or an inline JSON value.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => JsonBlob { text },
            other => JsonBlob::from(other),
        })
    }
}
