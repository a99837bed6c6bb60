use crate::error::DocstoreError;
use crate::model::{DocumentKey, ResourcePath};
use crate::value::MapValue;

/// One raw document as returned by the backend, before decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDocument {
    key: DocumentKey,
    data: MapValue,
}

impl RawDocument {
    pub fn new(key: DocumentKey, data: MapValue) -> Self {
        Self { key, data }
    }

    /// The document identifier (last path segment).
    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn path(&self) -> &ResourcePath {
        self.key.path()
    }

    pub fn data(&self) -> &MapValue {
        &self.data
    }

    pub fn into_data(self) -> MapValue {
        self.data
    }
}

/// One successfully decoded document, keeping its source id.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedRecord<T> {
    id: String,
    value: T,
}

impl<T> DecodedRecord<T> {
    pub fn new(id: impl Into<String>, value: T) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Result of decoding a batch of raw documents.
///
/// Decode failures are tolerated per record and carried here for
/// diagnostics; the batch as a whole only fails (upstream, in the pipeline)
/// when every record failed.
#[derive(Clone, Debug)]
pub struct DecodedBatch<T> {
    records: Vec<DecodedRecord<T>>,
    failures: Vec<DocstoreError>,
}

impl<T> DecodedBatch<T> {
    pub fn new(records: Vec<DecodedRecord<T>>, failures: Vec<DocstoreError>) -> Self {
        Self { records, failures }
    }

    pub fn records(&self) -> &[DecodedRecord<T>] {
        &self.records
    }

    pub fn failures(&self) -> &[DocstoreError] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<DecodedRecord<T>> {
        self.records
    }
}

impl<T: Clone> DecodedBatch<T> {
    /// The decoded values in result order, without their ids.
    pub fn values(&self) -> Vec<T> {
        self.records
            .iter()
            .map(|record| record.value().clone())
            .collect()
    }
}

impl<T> IntoIterator for DecodedBatch<T> {
    type Item = DecodedRecord<T>;
    type IntoIter = std::vec::IntoIter<DecodedRecord<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
