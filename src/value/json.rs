//! Bridge between document values and `serde_json`, used by the serde-based
//! data converters.
//!
//! Timestamps render as RFC 3339 strings; JSON has no timestamp kind, so the
//! reverse direction leaves strings as strings and models decode them with
//! whatever string/date representation they declare.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{invalid_argument, DocstoreResult};
use crate::value::{MapValue, Value, ValueKind};

pub fn value_to_json(value: &Value) -> JsonValue {
    match value.kind() {
        ValueKind::Null => JsonValue::Null,
        ValueKind::Boolean(inner) => JsonValue::Bool(*inner),
        ValueKind::Integer(inner) => JsonValue::from(*inner),
        ValueKind::Double(inner) => {
            serde_json::Number::from_f64(*inner).map_or(JsonValue::Null, JsonValue::Number)
        }
        ValueKind::Timestamp(inner) => JsonValue::String(inner.to_rfc3339()),
        ValueKind::String(inner) => JsonValue::String(inner.clone()),
        ValueKind::Array(array) => {
            JsonValue::Array(array.values().iter().map(value_to_json).collect())
        }
        ValueKind::Map(map) => map_to_json(map),
    }
}

pub fn value_from_json(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::null(),
        JsonValue::Bool(inner) => Value::from_bool(*inner),
        JsonValue::Number(number) => number
            .as_i64()
            .map(Value::from_integer)
            .unwrap_or_else(|| Value::from_double(number.as_f64().unwrap_or(f64::NAN))),
        JsonValue::String(inner) => Value::from_string(inner.clone()),
        JsonValue::Array(values) => Value::from_array(values.iter().map(value_from_json).collect()),
        JsonValue::Object(fields) => Value::from_map(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), value_from_json(value)))
                .collect(),
        ),
    }
}

pub fn map_to_json(map: &MapValue) -> JsonValue {
    JsonValue::Object(
        map.fields()
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect(),
    )
}

pub fn map_from_json(value: &JsonValue) -> DocstoreResult<MapValue> {
    match value {
        JsonValue::Object(fields) => {
            let fields: BTreeMap<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.clone(), value_from_json(value)))
                .collect();
            Ok(MapValue::new(fields))
        }
        other => Err(invalid_argument(format!(
            "Document data must be a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;

    #[test]
    fn scalar_roundtrip() {
        let original = Value::from_map(BTreeMap::from([
            ("count".to_string(), Value::from_integer(3)),
            ("ratio".to_string(), Value::from_double(0.5)),
            ("name".to_string(), Value::from_string("chess")),
            ("active".to_string(), Value::from_bool(true)),
            ("missing".to_string(), Value::null()),
        ]));
        let roundtripped = value_from_json(&value_to_json(&original));
        assert_eq!(roundtripped, original);
    }

    #[test]
    fn timestamps_render_as_rfc3339_strings() {
        let value = Value::from_timestamp(Timestamp::new(1_700_000_000, 0));
        match value_to_json(&value) {
            JsonValue::String(rendered) => {
                assert!(rendered.starts_with("2023-11-14T"));
            }
            other => panic!("expected string, got {other}"),
        }
    }

    #[test]
    fn rejects_non_object_document_data() {
        let err = map_from_json(&JsonValue::Bool(true)).unwrap_err();
        assert_eq!(err.code_str(), "docstore/invalid-argument");
    }
}
