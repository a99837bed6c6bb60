use std::collections::BTreeMap;

use crate::model::Timestamp;
use crate::value::{ArrayValue, MapValue};

/// A document field value.
///
/// This is a closed variant over the value kinds the backend contract
/// supports; filters and update payloads are built from it, which keeps
/// serialization and cache-key derivation well-defined without runtime type
/// inspection.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Array(ArrayValue),
    Map(MapValue),
}

impl Value {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_array(values: Vec<Value>) -> Self {
        Self {
            kind: ValueKind::Array(ArrayValue::new(values)),
        }
    }

    pub fn from_map(fields: BTreeMap<String, Value>) -> Self {
        Self {
            kind: ValueKind::Map(MapValue::new(fields)),
        }
    }

    pub fn from_map_value(map: MapValue) -> Self {
        Self {
            kind: ValueKind::Map(map),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Deterministic rendering used for cache-key derivation. Two equal
    /// values always render identically; map fields render in key order.
    pub fn canonical_string(&self) -> String {
        match &self.kind {
            ValueKind::Null => "null".to_string(),
            ValueKind::Boolean(value) => value.to_string(),
            ValueKind::Integer(value) => value.to_string(),
            ValueKind::Double(value) => format!("{value:?}"),
            ValueKind::Timestamp(value) => format!("{}.{:09}", value.seconds, value.nanos),
            ValueKind::String(value) => value.clone(),
            ValueKind::Array(array) => {
                let rendered: Vec<String> =
                    array.values().iter().map(Value::canonical_string).collect();
                format!("[{}]", rendered.join(","))
            }
            ValueKind::Map(map) => {
                let rendered: Vec<String> = map
                    .fields()
                    .iter()
                    .map(|(name, value)| format!("{}:{}", name, value.canonical_string()))
                    .collect();
                format!("{{{}}}", rendered.join(","))
            }
        }
    }
}
