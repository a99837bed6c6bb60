use std::sync::Arc;

use crate::api::converter::DataConverter;
use crate::api::query::QueryDescriptor;
use crate::api::reference::Reference;
use crate::api::snapshot::{DecodedBatch, DecodedRecord, RawDocument};
use crate::backend::{DocumentBackend, DocumentSnapshotCallback, QuerySnapshotCallback};
use crate::error::{
    backend_failure, decoding_failure, not_found, BackendAction, DocstoreError, DocstoreResult,
};
use crate::model::ResourcePath;
use crate::registry::ListenerRegistry;
use crate::value::MapValue;

/// Callback invoked with each decoded collection snapshot of a listen-mode
/// read.
pub type CollectionUpdateCallback<T> =
    Arc<dyn Fn(DocstoreResult<DecodedBatch<T>>) + Send + Sync>;

/// Callback invoked with each decoded document snapshot of a listen-mode
/// read. An absent document is delivered as a `NotFound` error.
pub type DocumentUpdateCallback<T> =
    Arc<dyn Fn(DocstoreResult<DecodedRecord<T>>) + Send + Sync>;

/// Fetch/decode pipeline over a document backend.
///
/// Reads resolve the reference, execute against the backend and decode each
/// returned record independently; writes pass straight through with uniform
/// error wrapping and no retries. Listen-mode reads are de-duplicated
/// through the client's [`ListenerRegistry`], keyed by the descriptor cache
/// key (queries) or the resolved document path (documents).
#[derive(Clone)]
pub struct DocstoreClient {
    backend: Arc<dyn DocumentBackend>,
    listeners: Arc<ListenerRegistry>,
}

impl DocstoreClient {
    /// Creates a client with its own listener registry.
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self::with_registry(backend, Arc::new(ListenerRegistry::new()))
    }

    /// Creates a client that shares `listeners` with other clients.
    pub fn with_registry(backend: Arc<dyn DocumentBackend>, listeners: Arc<ListenerRegistry>) -> Self {
        Self { backend, listeners }
    }

    /// Returns a client backed by [`crate::backend::InMemoryBackend`].
    ///
    /// Useful for tests or demos where no real backend is available.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::backend::InMemoryBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Executes `descriptor` once and decodes the results.
    ///
    /// Per-record decode failures are tolerated and reported out-of-band
    /// (logged, and carried on the returned batch); the whole operation only
    /// fails when the result set is non-empty and nothing decoded.
    pub async fn fetch_collection<C>(
        &self,
        descriptor: &QueryDescriptor,
        converter: &C,
    ) -> DocstoreResult<DecodedBatch<C::Model>>
    where
        C: DataConverter,
    {
        let documents = self
            .backend
            .run_query(descriptor)
            .await
            .map_err(|err| wrap_backend_error(err, BackendAction::Read, descriptor.path(), None))?;
        decode_documents(&documents, converter)
    }

    /// Executes `descriptor` in listen mode. The callback receives the
    /// decoded initial snapshot and one decoded snapshot per backend change,
    /// in emission order, until [`DocstoreClient::remove_listener`] is
    /// called with the returned cache key.
    ///
    /// A second listen for the same cache key cancels and replaces the
    /// previous watch, so at most one backend subscription is live per key.
    pub async fn listen_collection<C>(
        &self,
        descriptor: &QueryDescriptor,
        converter: &C,
        on_change: CollectionUpdateCallback<C::Model>,
    ) -> DocstoreResult<String>
    where
        C: DataConverter,
    {
        let converter = converter.clone();
        let callback: QuerySnapshotCallback = Arc::new(move |snapshot| {
            let outcome =
                snapshot.and_then(|documents| decode_documents(&documents, &converter));
            on_change(outcome);
        });
        let registration = self
            .backend
            .watch_query(descriptor, callback)
            .await
            .map_err(|err| wrap_backend_error(err, BackendAction::Read, descriptor.path(), None))?;
        let key = descriptor.cache_key();
        self.listeners.register(key.clone(), registration);
        Ok(key)
    }

    /// Reads the document `id` under `reference`.
    ///
    /// # Errors
    /// `NotFound` when the document does not exist, as opposed to
    /// `Backend`, which means the lookup itself failed.
    pub async fn fetch_document<C>(
        &self,
        reference: &Reference,
        id: &str,
        converter: &C,
    ) -> DocstoreResult<DecodedRecord<C::Model>>
    where
        C: DataConverter,
    {
        let key = reference.resolve_document(id)?;
        let snapshot = self
            .backend
            .get_document(&key)
            .await
            .map_err(|err| {
                wrap_backend_error(err, BackendAction::Read, &key.collection_path(), Some(id))
            })?;
        match snapshot {
            Some(document) => decode_document(&document, converter),
            None => Err(not_found(key.path().canonical_string())),
        }
    }

    /// Watches the document `id` under `reference`, keyed by its resolved
    /// path. Same replace semantics as [`DocstoreClient::listen_collection`].
    pub async fn listen_document<C>(
        &self,
        reference: &Reference,
        id: &str,
        converter: &C,
        on_change: DocumentUpdateCallback<C::Model>,
    ) -> DocstoreResult<String>
    where
        C: DataConverter,
    {
        let key = reference.resolve_document(id)?;
        let path = key.path().canonical_string();
        let converter = converter.clone();
        let missing_path = path.clone();
        let callback: DocumentSnapshotCallback = Arc::new(move |snapshot| {
            let outcome = snapshot.and_then(|document| match document {
                Some(document) => decode_document(&document, &converter),
                None => Err(not_found(missing_path.clone())),
            });
            on_change(outcome);
        });
        let registration = self
            .backend
            .watch_document(&key, callback)
            .await
            .map_err(|err| {
                wrap_backend_error(err, BackendAction::Read, &key.collection_path(), Some(id))
            })?;
        self.listeners.register(path.clone(), registration);
        Ok(path)
    }

    /// Creates a document under `reference`, letting the backend assign an
    /// id when none is given. Returns the stored id.
    pub async fn create<C>(
        &self,
        reference: &Reference,
        model: &C::Model,
        id: Option<&str>,
        converter: &C,
    ) -> DocstoreResult<String>
    where
        C: DataConverter,
    {
        let collection = reference.resolve()?;
        let data = converter.to_map(model)?;
        let assigned = self
            .backend
            .create_document(&collection, data, id.map(str::to_string))
            .await
            .map_err(|err| wrap_backend_error(err, BackendAction::Create, &collection, id))?;
        log::debug!("created document /{collection}/{assigned}");
        Ok(assigned)
    }

    /// Overwrites (or merges into) the document `id` under `reference`.
    pub async fn update<C>(
        &self,
        reference: &Reference,
        id: &str,
        model: &C::Model,
        merge: bool,
        converter: &C,
    ) -> DocstoreResult<()>
    where
        C: DataConverter,
    {
        let key = reference.resolve_document(id)?;
        let data = converter.to_map(model)?;
        self.backend
            .set_document(&key, data, merge)
            .await
            .map_err(|err| {
                wrap_backend_error(err, BackendAction::Update, &key.collection_path(), Some(id))
            })?;
        log::debug!("updated document /{}", key.path());
        Ok(())
    }

    /// Merges raw field values into the document `id` under `reference`,
    /// leaving all other fields untouched.
    pub async fn update_fields(
        &self,
        reference: &Reference,
        id: &str,
        fields: MapValue,
    ) -> DocstoreResult<()> {
        let key = reference.resolve_document(id)?;
        self.backend
            .set_document(&key, fields, true)
            .await
            .map_err(|err| {
                wrap_backend_error(err, BackendAction::Update, &key.collection_path(), Some(id))
            })?;
        log::debug!("updated fields of document /{}", key.path());
        Ok(())
    }

    /// Deletes the document `id` under `reference`. Succeeds even when the
    /// document does not exist.
    pub async fn delete(&self, reference: &Reference, id: &str) -> DocstoreResult<()> {
        let key = reference.resolve_document(id)?;
        self.backend.delete_document(&key).await.map_err(|err| {
            wrap_backend_error(err, BackendAction::Delete, &key.collection_path(), Some(id))
        })?;
        log::debug!("deleted document /{}", key.path());
        Ok(())
    }

    /// Writes `models` as new documents under `reference` in one backend
    /// batch. Encoding failures abort before anything is written.
    pub async fn batch_create<C>(
        &self,
        reference: &Reference,
        models: &[C::Model],
        converter: &C,
    ) -> DocstoreResult<()>
    where
        C: DataConverter,
    {
        let collection = reference.resolve()?;
        let mut writes = Vec::with_capacity(models.len());
        for model in models {
            writes.push(converter.to_map(model)?);
        }
        self.backend
            .commit_batch(&collection, writes)
            .await
            .map_err(|err| {
                wrap_backend_error(err, BackendAction::BatchCreate, &collection, None)
            })?;
        log::debug!("batch-created {} documents under /{collection}", models.len());
        Ok(())
    }

    /// Counts the documents matching `descriptor` without fetching them.
    pub async fn count(&self, descriptor: &QueryDescriptor) -> DocstoreResult<u64> {
        self.backend
            .count(descriptor)
            .await
            .map_err(|err| wrap_backend_error(err, BackendAction::Read, descriptor.path(), None))
    }

    /// Cancels the listener registered under `key`. Idempotent; unknown keys
    /// are a no-op.
    pub fn remove_listener(&self, key: &str) {
        self.listeners.remove(key);
    }
}

/// Wraps a backend error with the action/path/id context of the failed
/// operation. `NotFound` passes through untouched so callers can still tell
/// "absent" from "failed", and errors that already carry backend context are
/// not wrapped twice.
fn wrap_backend_error(
    err: DocstoreError,
    action: BackendAction,
    path: &ResourcePath,
    id: Option<&str>,
) -> DocstoreError {
    match err {
        DocstoreError::NotFound { .. } | DocstoreError::Backend { .. } => err,
        other => backend_failure(
            action,
            path.canonical_string(),
            id.map(str::to_string),
            other.to_string(),
        ),
    }
}

fn decode_document<C>(document: &RawDocument, converter: &C) -> DocstoreResult<DecodedRecord<C::Model>>
where
    C: DataConverter,
{
    converter
        .from_map(document.data())
        .map(|model| DecodedRecord::new(document.id(), model))
        .map_err(|err| decoding_failure(Some(document.id().to_string()), err.to_string()))
}

/// Decodes every raw document independently. Individual failures are
/// collected and logged; the batch fails only when it contained documents
/// and none of them decoded, which signals a schema mismatch rather than
/// isolated bad records.
fn decode_documents<C>(
    documents: &[RawDocument],
    converter: &C,
) -> DocstoreResult<DecodedBatch<C::Model>>
where
    C: DataConverter,
{
    let mut records = Vec::with_capacity(documents.len());
    let mut failures = Vec::new();
    for document in documents {
        match decode_document(document, converter) {
            Ok(record) => records.push(record),
            Err(err) => failures.push(err),
        }
    }

    if records.is_empty() {
        if let Some(first) = failures.first() {
            return Err(first.clone());
        }
    }

    if !failures.is_empty() {
        let ids: Vec<&str> = failures
            .iter()
            .filter_map(|failure| match failure {
                DocstoreError::Decoding { id, .. } => id.as_deref(),
                _ => None,
            })
            .collect();
        log::warn!("could not decode document(s): {}", ids.join(","));
    }

    Ok(DecodedBatch::new(records, failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::converter::{PassthroughConverter, SerdeConverter};
    use crate::api::query::{Filter, FilterOperator};
    use crate::value::Value;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Game {
        name: String,
        round: i64,
    }

    fn game_converter() -> SerdeConverter<Game> {
        SerdeConverter::new()
    }

    fn raw_game(id: &str, round: i64) -> RawDocument {
        RawDocument::new(
            crate::model::DocumentKey::from_string(&format!("games/{id}")).unwrap(),
            MapValue::new(BTreeMap::from([
                ("name".to_string(), Value::from_string(id)),
                ("round".to_string(), Value::from_integer(round)),
            ])),
        )
    }

    fn raw_junk(id: &str) -> RawDocument {
        RawDocument::new(
            crate::model::DocumentKey::from_string(&format!("games/{id}")).unwrap(),
            MapValue::new(BTreeMap::from([(
                "round".to_string(),
                Value::from_string("not a number"),
            )])),
        )
    }

    #[test]
    fn partial_decode_failures_are_tolerated() {
        let documents = vec![
            raw_game("a", 1),
            raw_junk("b"),
            raw_game("c", 2),
            raw_junk("d"),
            raw_game("e", 3),
        ];
        let batch = decode_documents(&documents, &game_converter()).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.failures().len(), 2);
    }

    #[test]
    fn total_decode_failure_escalates() {
        let documents = vec![raw_junk("a"), raw_junk("b"), raw_junk("c")];
        let err = decode_documents(&documents, &game_converter()).unwrap_err();
        assert!(err.is_decoding());
        match err {
            DocstoreError::Decoding { id, .. } => assert_eq!(id.as_deref(), Some("a")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_result_set_is_success() {
        let batch = decode_documents::<SerdeConverter<Game>>(&[], &game_converter()).unwrap();
        assert!(batch.is_empty());
        assert!(batch.failures().is_empty());
    }

    #[tokio::test]
    async fn fetch_document_distinguishes_not_found() {
        let client = DocstoreClient::in_memory();
        let games = Reference::root("games");
        let err = client
            .fetch_document(&games, "missing", &game_converter())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_fetch_update_delete_roundtrip() {
        let client = DocstoreClient::in_memory();
        let games = Reference::root("games");
        let converter = game_converter();

        let id = client
            .create(
                &games,
                &Game {
                    name: "chess".into(),
                    round: 1,
                },
                None,
                &converter,
            )
            .await
            .unwrap();

        let record = client.fetch_document(&games, &id, &converter).await.unwrap();
        assert_eq!(record.value().round, 1);

        client
            .update_fields(
                &games,
                &id,
                MapValue::new(BTreeMap::from([(
                    "round".to_string(),
                    Value::from_integer(2),
                )])),
            )
            .await
            .unwrap();
        let record = client.fetch_document(&games, &id, &converter).await.unwrap();
        assert_eq!(record.value().name, "chess");
        assert_eq!(record.value().round, 2);

        client.delete(&games, &id).await.unwrap();
        let err = client
            .fetch_document(&games, &id, &converter)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn listen_collection_replaces_duplicate_keys() {
        let client = DocstoreClient::in_memory();
        let games = Reference::root("games");
        let descriptor = QueryDescriptor::collection(&games).unwrap();
        let converter = PassthroughConverter;

        let updates = Arc::new(Mutex::new(0usize));
        let callback: CollectionUpdateCallback<MapValue> = {
            let updates = Arc::clone(&updates);
            Arc::new(move |_| {
                *updates.lock().unwrap() += 1;
            })
        };

        let key_a = client
            .listen_collection(&descriptor, &converter, Arc::clone(&callback))
            .await
            .unwrap();
        let key_b = client
            .listen_collection(&descriptor, &converter, callback)
            .await
            .unwrap();

        assert_eq!(key_a, key_b);
        assert_eq!(client.listeners().len(), 1);

        client.remove_listener(&key_a);
        client.remove_listener(&key_a);
        assert!(client.listeners().is_empty());
    }

    #[tokio::test]
    async fn batch_create_writes_every_model() {
        let client = DocstoreClient::in_memory();
        let games = Reference::root("games");
        let converter = game_converter();
        let models: Vec<Game> = (1..=3)
            .map(|round| Game {
                name: format!("game-{round}"),
                round,
            })
            .collect();

        client
            .batch_create(&games, &models, &converter)
            .await
            .unwrap();

        let descriptor = QueryDescriptor::collection(&games).unwrap();
        assert_eq!(client.count(&descriptor).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn incomplete_reference_surfaces_before_the_backend() {
        let client = DocstoreClient::in_memory();
        let moves = Reference::nested(Reference::root("games"), None, "moves");
        let err = client
            .fetch_document(&moves, "e4", &game_converter())
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "docstore/incomplete-reference");
    }

    #[tokio::test]
    async fn filtered_query_fetch() {
        let client = DocstoreClient::in_memory();
        let games = Reference::root("games");
        let converter = game_converter();
        for round in 1..=4 {
            client
                .create(
                    &games,
                    &Game {
                        name: format!("game-{round}"),
                        round,
                    },
                    None,
                    &converter,
                )
                .await
                .unwrap();
        }

        let descriptor = QueryDescriptor::build(
            &games,
            vec![Filter::new(
                "round",
                FilterOperator::GreaterThan,
                Value::from_integer(2),
            )],
            vec!["round".into()],
            false,
            None,
        )
        .unwrap();
        let batch = client.fetch_collection(&descriptor, &converter).await.unwrap();
        let rounds: Vec<i64> = batch.values().iter().map(|game| game.round).collect();
        assert_eq!(rounds, vec![3, 4]);
    }
}
