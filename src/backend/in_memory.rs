use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::api::{Filter, FilterOperator, QueryDescriptor, RawDocument};
use crate::error::{invalid_argument, DocstoreResult};
use crate::model::{validate_segment, DocumentKey, ResourcePath};
use crate::registry::WatchRegistration;
use crate::value::{MapValue, Value, ValueKind};

use super::{DocumentBackend, DocumentSnapshotCallback, QuerySnapshotCallback};

struct QueryWatcher {
    id: u64,
    descriptor: QueryDescriptor,
    callback: QuerySnapshotCallback,
}

struct DocumentWatcher {
    id: u64,
    key: DocumentKey,
    callback: DocumentSnapshotCallback,
}

/// Document backend that stores everything in memory and pushes snapshots
/// to registered watchers on every successful write.
///
/// Useful for tests and demos where no real backend is available; it is the
/// reference implementation of the [`DocumentBackend`] contract.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<BackendInner>,
}

#[derive(Default)]
struct BackendInner {
    documents: Mutex<BTreeMap<String, MapValue>>,
    query_watchers: Mutex<Vec<QueryWatcher>>,
    document_watchers: Mutex<Vec<DocumentWatcher>>,
    watcher_counter: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn store_document(&self, key: &DocumentKey, data: MapValue, merge: bool) {
        let mut documents = self.inner.documents.lock().unwrap();
        let canonical = key.path().canonical_string();
        let stored = match (merge, documents.get(&canonical)) {
            (true, Some(existing)) => existing.merged_with(&data),
            _ => data,
        };
        documents.insert(canonical, stored);
    }

    fn execute_query(&self, descriptor: &QueryDescriptor) -> Vec<RawDocument> {
        let documents = self.inner.documents.lock().unwrap();
        let mut matches: Vec<RawDocument> = documents
            .iter()
            .filter_map(|(path, data)| {
                let key = DocumentKey::from_string(path).ok()?;
                if key.collection_path() != *descriptor.path() {
                    return None;
                }
                let document = RawDocument::new(key, data.clone());
                document_satisfies_filters(&document, descriptor.filters()).then_some(document)
            })
            .collect();
        drop(documents);

        matches.sort_by(|left, right| compare_documents(left, right, descriptor));
        if let Some(limit) = descriptor.limit() {
            matches.truncate(limit as usize);
        }
        matches
    }

    fn read_document(&self, key: &DocumentKey) -> Option<RawDocument> {
        self.inner
            .documents
            .lock()
            .unwrap()
            .get(&key.path().canonical_string())
            .map(|data| RawDocument::new(key.clone(), data.clone()))
    }

    /// Pushes a fresh snapshot to every watcher. Snapshots are computed
    /// after the triggering write has been applied, so each watcher observes
    /// writes in commit order.
    fn notify_watchers(&self) {
        let query_snapshot_targets: Vec<(QueryDescriptor, QuerySnapshotCallback)> = {
            let watchers = self.inner.query_watchers.lock().unwrap();
            watchers
                .iter()
                .map(|watcher| (watcher.descriptor.clone(), Arc::clone(&watcher.callback)))
                .collect()
        };
        for (descriptor, callback) in query_snapshot_targets {
            callback(Ok(self.execute_query(&descriptor)));
        }

        let document_targets: Vec<(DocumentKey, DocumentSnapshotCallback)> = {
            let watchers = self.inner.document_watchers.lock().unwrap();
            watchers
                .iter()
                .map(|watcher| (watcher.key.clone(), Arc::clone(&watcher.callback)))
                .collect()
        };
        for (key, callback) in document_targets {
            callback(Ok(self.read_document(&key)));
        }
    }

    fn next_watcher_id(&self) -> u64 {
        self.inner.watcher_counter.fetch_add(1, AtomicOrdering::SeqCst)
    }

    fn remove_query_watcher(&self, id: u64) {
        let mut watchers = self.inner.query_watchers.lock().unwrap();
        watchers.retain(|watcher| watcher.id != id);
    }

    fn remove_document_watcher(&self, id: u64) {
        let mut watchers = self.inner.document_watchers.lock().unwrap();
        watchers.retain(|watcher| watcher.id != id);
    }

    /// Number of live watches, across queries and documents.
    pub fn watcher_count(&self) -> usize {
        self.inner.query_watchers.lock().unwrap().len()
            + self.inner.document_watchers.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn run_query(&self, descriptor: &QueryDescriptor) -> DocstoreResult<Vec<RawDocument>> {
        Ok(self.execute_query(descriptor))
    }

    async fn get_document(&self, key: &DocumentKey) -> DocstoreResult<Option<RawDocument>> {
        Ok(self.read_document(key))
    }

    async fn create_document(
        &self,
        collection: &ResourcePath,
        data: MapValue,
        id: Option<String>,
    ) -> DocstoreResult<String> {
        let id = match id {
            Some(id) => {
                validate_segment(&id, "Document id")?;
                id
            }
            None => generate_auto_id(),
        };
        let key = DocumentKey::from_path(collection.child(id.clone()))?;
        self.store_document(&key, data, false);
        self.notify_watchers();
        Ok(id)
    }

    async fn set_document(
        &self,
        key: &DocumentKey,
        data: MapValue,
        merge: bool,
    ) -> DocstoreResult<()> {
        if merge && data.is_empty() {
            return Err(invalid_argument(
                "Merge write requires at least one field/value pair",
            ));
        }
        self.store_document(key, data, merge);
        self.notify_watchers();
        Ok(())
    }

    async fn delete_document(&self, key: &DocumentKey) -> DocstoreResult<()> {
        self.inner
            .documents
            .lock()
            .unwrap()
            .remove(&key.path().canonical_string());
        self.notify_watchers();
        Ok(())
    }

    async fn commit_batch(
        &self,
        collection: &ResourcePath,
        writes: Vec<MapValue>,
    ) -> DocstoreResult<()> {
        {
            let mut documents = self.inner.documents.lock().unwrap();
            for data in writes {
                let path = collection.child(generate_auto_id());
                documents.insert(path.canonical_string(), data);
            }
        }
        self.notify_watchers();
        Ok(())
    }

    async fn count(&self, descriptor: &QueryDescriptor) -> DocstoreResult<u64> {
        Ok(self.execute_query(descriptor).len() as u64)
    }

    async fn watch_query(
        &self,
        descriptor: &QueryDescriptor,
        callback: QuerySnapshotCallback,
    ) -> DocstoreResult<WatchRegistration> {
        let id = self.next_watcher_id();
        callback(Ok(self.execute_query(descriptor)));
        self.inner.query_watchers.lock().unwrap().push(QueryWatcher {
            id,
            descriptor: descriptor.clone(),
            callback,
        });
        let backend = self.clone();
        Ok(WatchRegistration::new(move || {
            backend.remove_query_watcher(id)
        }))
    }

    async fn watch_document(
        &self,
        key: &DocumentKey,
        callback: DocumentSnapshotCallback,
    ) -> DocstoreResult<WatchRegistration> {
        let id = self.next_watcher_id();
        callback(Ok(self.read_document(key)));
        self.inner
            .document_watchers
            .lock()
            .unwrap()
            .push(DocumentWatcher {
                id,
                key: key.clone(),
                callback,
            });
        let backend = self.clone();
        Ok(WatchRegistration::new(move || {
            backend.remove_document_watcher(id)
        }))
    }
}

fn generate_auto_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(20)
        .collect()
}

fn document_satisfies_filters(document: &RawDocument, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        match document.data().get(filter.field()) {
            Some(value) => evaluate_filter(filter, value),
            // Missing fields only satisfy a not-equal check, matching the
            // null-semantics of the modeled backend.
            None => filter.operator() == FilterOperator::NotEqual
                && evaluate_filter(filter, &Value::null()),
        }
    })
}

fn evaluate_filter(filter: &Filter, value: &Value) -> bool {
    match filter.operator() {
        FilterOperator::Equal => value == filter.value(),
        FilterOperator::NotEqual => value != filter.value(),
        FilterOperator::GreaterThan => {
            compare_values(value, filter.value()) == Some(Ordering::Greater)
        }
        FilterOperator::GreaterThanOrEqual => matches!(
            compare_values(value, filter.value()),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FilterOperator::LessThan => compare_values(value, filter.value()) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare_values(value, filter.value()),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.kind(), right.kind()) {
        (ValueKind::Null, ValueKind::Null) => Some(Ordering::Equal),
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => Some(a.cmp(b)),
        (ValueKind::Integer(a), ValueKind::Integer(b)) => Some(a.cmp(b)),
        (ValueKind::Double(a), ValueKind::Double(b)) => a.partial_cmp(b),
        (ValueKind::Integer(a), ValueKind::Double(b)) => (*a as f64).partial_cmp(b),
        (ValueKind::Double(a), ValueKind::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (ValueKind::Timestamp(a), ValueKind::Timestamp(b)) => Some(a.cmp(b)),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_documents(
    left: &RawDocument,
    right: &RawDocument,
    descriptor: &QueryDescriptor,
) -> Ordering {
    for field in descriptor.order_by() {
        let left_value = left.data().get(field).cloned().unwrap_or_else(Value::null);
        let right_value = right.data().get(field).cloned().unwrap_or_else(Value::null);
        let mut ordering = compare_values(&left_value, &right_value).unwrap_or(Ordering::Equal);
        if descriptor.descending() {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    // Stable fallback so result order is deterministic without ordering keys.
    left.id().cmp(right.id())
}
