use std::sync::{Arc, Mutex};

use crate::api::{
    CollectionUpdateCallback, DataConverter, DecodedRecord, DocstoreClient, Filter,
    QueryDescriptor, Reference,
};
use crate::error::{DocstoreError, DocstoreResult};
use crate::value::MapValue;

use super::{ErrorHook, RepositoryState, StateCell};

/// Reactive repository over one collection query.
///
/// Holds the latest decoded result of its query and re-publishes it through
/// [`CollectionRepository::watch`] streams whenever a fetch or a realtime
/// snapshot lands. Pipeline errors go to the error handler and never touch
/// the held value. Construction is cheap; nothing contacts the backend until
/// the first `fetch` or `listen` call.
pub struct CollectionRepository<C>
where
    C: DataConverter,
{
    client: DocstoreClient,
    converter: C,
    reference: Reference,
    filters: Vec<Filter>,
    order_by: Vec<String>,
    descending: bool,
    limit: Option<u32>,
    shared: Arc<Shared<C::Model>>,
}

struct Shared<T> {
    cell: StateCell<Vec<DecodedRecord<T>>>,
    errors: ErrorHook,
    listener_key: Mutex<Option<String>>,
}

impl<C> CollectionRepository<C>
where
    C: DataConverter,
{
    pub fn new(client: DocstoreClient, reference: Reference, converter: C) -> Self {
        Self {
            client,
            converter,
            reference,
            filters: Vec::new(),
            order_by: Vec::new(),
            descending: false,
            limit: None,
            shared: Arc::new(Shared {
                cell: StateCell::new(),
                errors: ErrorHook::new(),
                listener_key: Mutex::new(None),
            }),
        }
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    /// Ordering keys applied in sequence; all share the `descending` flag.
    pub fn with_order(mut self, order_by: Vec<String>, descending: bool) -> Self {
        self.order_by = order_by;
        self.descending = descending;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Handler for pipeline errors; replaces any previous handler. Without
    /// one, errors are logged.
    pub fn set_error_handler(&self, handler: impl Fn(DocstoreError) + Send + Sync + 'static) {
        self.shared.errors.set(handler);
    }

    /// The current repository state.
    pub fn current(&self) -> RepositoryState<Vec<DecodedRecord<C::Model>>> {
        self.shared.cell.current()
    }

    /// The last-known decoded values, or empty when no snapshot has arrived
    /// yet.
    pub fn values(&self) -> Vec<C::Model> {
        match self.shared.cell.current() {
            RepositoryState::Ready(records) => records
                .into_iter()
                .map(DecodedRecord::into_value)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Opens a stream of state transitions, starting with the current state
    /// (unless the repository is untouched). The receiver implements
    /// `futures::Stream`; dropping it detaches the observer.
    pub fn watch(&self) -> async_channel::Receiver<RepositoryState<Vec<DecodedRecord<C::Model>>>> {
        self.shared.cell.watch()
    }

    fn descriptor(&self) -> DocstoreResult<QueryDescriptor> {
        QueryDescriptor::build(
            &self.reference,
            self.filters.clone(),
            self.order_by.clone(),
            self.descending,
            self.limit,
        )
    }

    /// Executes the query once and replaces the held value with the result.
    /// Errors go to the error handler; the held value stays as it was.
    pub async fn fetch(&self) {
        if self.shared.cell.is_disposed() {
            return;
        }
        self.shared.cell.begin_loading();
        let descriptor = match self.descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.shared.errors.emit(err);
                return;
            }
        };
        match self.client.fetch_collection(&descriptor, &self.converter).await {
            Ok(batch) => {
                self.shared
                    .cell
                    .set(RepositoryState::Ready(batch.into_records()));
            }
            Err(err) => self.shared.errors.emit(err),
        }
    }

    /// Starts a realtime listener for the query. Every backend snapshot
    /// replaces the held value; a repeated `listen` call replaces the
    /// previous backend subscription rather than stacking a second one.
    pub async fn listen(&self) {
        if self.shared.cell.is_disposed() {
            return;
        }
        self.shared.cell.begin_loading();
        let descriptor = match self.descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.shared.errors.emit(err);
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let on_change: CollectionUpdateCallback<C::Model> = Arc::new(move |outcome| {
            if shared.cell.is_disposed() {
                return;
            }
            match outcome {
                Ok(batch) => shared.cell.set(RepositoryState::Ready(batch.into_records())),
                Err(err) => shared.errors.emit(err),
            }
        });

        match self
            .client
            .listen_collection(&descriptor, &self.converter, on_change)
            .await
        {
            Ok(key) => {
                *self.shared.listener_key.lock().expect("listener key poisoned") = Some(key);
            }
            Err(err) => self.shared.errors.emit(err),
        }
    }

    /// Stops the realtime listener, keeping the held value. Idempotent.
    pub fn remove_listener(&self) {
        let key = self
            .shared
            .listener_key
            .lock()
            .expect("listener key poisoned")
            .take();
        if let Some(key) = key {
            self.client.remove_listener(&key);
        }
    }

    /// Creates `model` in the collection; returns the assigned id. The
    /// error, if any, also reaches the error handler.
    pub async fn create(&self, model: &C::Model) -> DocstoreResult<String> {
        self.guard_disposed()?;
        self.forward_err(
            self.client
                .create(&self.reference, model, None, &self.converter)
                .await,
        )
    }

    /// Overwrites (or merges into) the document `id`.
    pub async fn update(&self, id: &str, model: &C::Model, merge: bool) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.forward_err(
            self.client
                .update(&self.reference, id, model, merge, &self.converter)
                .await,
        )
    }

    /// Deletes the document `id`.
    pub async fn delete(&self, id: &str) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.forward_err(self.client.delete(&self.reference, id).await)
    }

    /// Merges raw field values into the document `id`.
    pub async fn update_fields(&self, id: &str, fields: MapValue) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.forward_err(self.client.update_fields(&self.reference, id, fields).await)
    }

    /// Tears the repository down: stops the listener, publishes `Disposed`
    /// and closes all watch streams. Further calls are no-ops.
    pub fn dispose(&self) {
        self.remove_listener();
        self.shared.cell.dispose();
    }

    /// Mutations report their failure on the error handler as well as in
    /// the returned result, matching the listener error path.
    fn forward_err<T>(&self, result: DocstoreResult<T>) -> DocstoreResult<T> {
        if let Err(err) = &result {
            self.shared.errors.emit(err.clone());
        }
        result
    }

    fn guard_disposed(&self) -> DocstoreResult<()> {
        if self.shared.cell.is_disposed() {
            return Err(crate::error::invalid_argument(
                "Repository has been disposed",
            ));
        }
        Ok(())
    }
}

impl<C> Drop for CollectionRepository<C>
where
    C: DataConverter,
{
    fn drop(&mut self) {
        // A dropped repository must release its backend listener.
        self.dispose();
    }
}
