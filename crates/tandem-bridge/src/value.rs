//! Host-side values.
//!
//! [`HostValue`] is what the calling runtime hands to a bridged function and
//! receives back from it. It mirrors a dynamically typed host: null, booleans,
//! a single number type, strings, byte buffers, arrays and plain objects.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// A value on the calling (host) side of the bridge.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    /// Null or undefined.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. The host has a single floating point number type.
    Number(f64),
    /// A string.
    String(String),
    /// A byte buffer.
    Buffer(Vec<u8>),
    /// An ordered list.
    Array(Vec<HostValue>),
    /// A plain keyed object.
    Object(BTreeMap<String, HostValue>),
}

impl HostValue {
    /// Build a buffer value.
    #[must_use]
    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Buffer(bytes.into())
    }

    /// Whether the value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric payload, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up a key on an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Convert to JSON. Buffers render as base64 strings and non-finite
    /// numbers as `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Buffer(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(HostValue::to_json).collect())
            },
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            // Every JSON number has an f64 approximation.
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(HostValue::from).collect())
            },
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        Self::Array(value)
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(value: BTreeMap<String, HostValue>) -> Self {
        Self::Object(value)
    }
}
