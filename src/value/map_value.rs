use std::collections::BTreeMap;

use crate::value::Value;

/// An ordered map of named document fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: BTreeMap<String, Value>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlays `other` onto this map. Nested maps are merged recursively,
    /// every other kind is replaced.
    pub fn merged_with(&self, other: &MapValue) -> MapValue {
        let mut fields = self.fields.clone();
        for (name, incoming) in other.fields() {
            let merged = match (fields.get(name).map(Value::kind), incoming.kind()) {
                (Some(crate::value::ValueKind::Map(existing)), crate::value::ValueKind::Map(update)) => {
                    Value::from_map_value(existing.merged_with(update))
                }
                _ => incoming.clone(),
            };
            fields.insert(name.clone(), merged);
        }
        MapValue::new(fields)
    }
}

impl FromIterator<(String, Value)> for MapValue {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_and_recurses() {
        let base: MapValue = [
            ("name".to_string(), Value::from_string("chess")),
            (
                "meta".to_string(),
                Value::from_map([("plays".to_string(), Value::from_integer(3))].into()),
            ),
        ]
        .into_iter()
        .collect();
        let update: MapValue = [
            (
                "meta".to_string(),
                Value::from_map([("wins".to_string(), Value::from_integer(1))].into()),
            ),
        ]
        .into_iter()
        .collect();

        let merged = base.merged_with(&update);
        assert_eq!(merged.get("name"), Some(&Value::from_string("chess")));
        let meta = match merged.get("meta").unwrap().kind() {
            crate::value::ValueKind::Map(map) => map,
            _ => panic!("expected map"),
        };
        assert_eq!(meta.get("plays"), Some(&Value::from_integer(3)));
        assert_eq!(meta.get("wins"), Some(&Value::from_integer(1)));
    }
}
