mod in_memory;

pub use in_memory::InMemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{QueryDescriptor, RawDocument};
use crate::error::DocstoreResult;
use crate::model::{DocumentKey, ResourcePath};
use crate::registry::WatchRegistration;
use crate::value::MapValue;

/// Callback invoked with each query snapshot a watch delivers.
pub type QuerySnapshotCallback = Arc<dyn Fn(DocstoreResult<Vec<RawDocument>>) + Send + Sync>;

/// Callback invoked with each document snapshot a watch delivers. `None`
/// means the document does not exist at that point in time.
pub type DocumentSnapshotCallback =
    Arc<dyn Fn(DocstoreResult<Option<RawDocument>>) + Send + Sync>;

/// The external document-backend collaborator.
///
/// Query execution, realtime push and durable storage all happen behind
/// this trait. Watches deliver an initial snapshot
/// immediately, then one snapshot per backend-reported change, in emission
/// order, until the returned [`WatchRegistration`] is cancelled.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn run_query(&self, descriptor: &QueryDescriptor) -> DocstoreResult<Vec<RawDocument>>;

    async fn get_document(&self, key: &DocumentKey) -> DocstoreResult<Option<RawDocument>>;

    /// Creates a document, assigning an id when none is supplied. Returns
    /// the id under which the document was stored.
    async fn create_document(
        &self,
        collection: &ResourcePath,
        data: MapValue,
        id: Option<String>,
    ) -> DocstoreResult<String>;

    /// Writes the full document, or merges `data` into it when `merge` is
    /// set.
    async fn set_document(&self, key: &DocumentKey, data: MapValue, merge: bool)
        -> DocstoreResult<()>;

    async fn delete_document(&self, key: &DocumentKey) -> DocstoreResult<()>;

    /// Writes a batch of new documents into `collection` with assigned ids;
    /// the batch succeeds or fails as a unit.
    async fn commit_batch(
        &self,
        collection: &ResourcePath,
        writes: Vec<MapValue>,
    ) -> DocstoreResult<()>;

    /// Counts the documents matching `descriptor` without returning them.
    async fn count(&self, descriptor: &QueryDescriptor) -> DocstoreResult<u64>;

    async fn watch_query(
        &self,
        descriptor: &QueryDescriptor,
        callback: QuerySnapshotCallback,
    ) -> DocstoreResult<WatchRegistration>;

    async fn watch_document(
        &self,
        key: &DocumentKey,
        callback: DocumentSnapshotCallback,
    ) -> DocstoreResult<WatchRegistration>;
}
