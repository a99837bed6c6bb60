use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{decoding_failure, invalid_argument, DocstoreResult};
use crate::value::{map_from_json, map_to_json, MapValue};

/// Converts between user models and raw document maps.
///
/// Writes use `to_map`, reads use `from_map`. Implementations must be cheap
/// to clone; the pipeline clones the converter into listener callbacks.
pub trait DataConverter: Send + Sync + Clone + 'static {
    /// The strongly typed model associated with this converter.
    type Model: Clone + Send + Sync + 'static;

    fn to_map(&self, model: &Self::Model) -> DocstoreResult<MapValue>;

    fn from_map(&self, map: &MapValue) -> DocstoreResult<Self::Model>;
}

/// Converter backed by the model's serde implementations, bridged through
/// JSON. This is the converter most repositories use.
pub struct SerdeConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SerdeConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> DataConverter for SerdeConverter<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Model = T;

    fn to_map(&self, model: &T) -> DocstoreResult<MapValue> {
        let json = serde_json::to_value(model)
            .map_err(|err| invalid_argument(format!("Failed to encode model: {err}")))?;
        map_from_json(&json)
    }

    fn from_map(&self, map: &MapValue) -> DocstoreResult<T> {
        serde_json::from_value(map_to_json(map))
            .map_err(|err| decoding_failure(None, err.to_string()))
    }
}

/// Converter that surfaces raw document maps unchanged.
#[derive(Clone, Default)]
pub struct PassthroughConverter;

impl DataConverter for PassthroughConverter {
    type Model = MapValue;

    fn to_map(&self, model: &MapValue) -> DocstoreResult<MapValue> {
        Ok(model.clone())
    }

    fn from_map(&self, map: &MapValue) -> DocstoreResult<MapValue> {
        Ok(map.clone())
    }
}
