use std::sync::{Arc, Mutex};

use crate::api::{DataConverter, DocstoreClient, DocumentUpdateCallback, Reference};
use crate::error::{DocstoreError, DocstoreResult};
use crate::value::MapValue;

use super::{ErrorHook, RepositoryState, StateCell};

/// Reactive repository over one document.
///
/// Holds the latest decoded model of the document and re-publishes it
/// through [`ObjectRepository::watch`] streams. The listener is keyed by the
/// resolved document path. As with the collection form, errors reach the
/// error handler and never corrupt the held value.
pub struct ObjectRepository<C>
where
    C: DataConverter,
{
    client: DocstoreClient,
    converter: C,
    reference: Reference,
    object_id: String,
    shared: Arc<Shared<C::Model>>,
}

struct Shared<T> {
    cell: StateCell<T>,
    errors: ErrorHook,
    listener_key: Mutex<Option<String>>,
}

impl<C> ObjectRepository<C>
where
    C: DataConverter,
{
    pub fn new(
        client: DocstoreClient,
        reference: Reference,
        object_id: impl Into<String>,
        converter: C,
    ) -> Self {
        Self {
            client,
            converter,
            reference,
            object_id: object_id.into(),
            shared: Arc::new(Shared {
                cell: StateCell::new(),
                errors: ErrorHook::new(),
                listener_key: Mutex::new(None),
            }),
        }
    }

    /// Seeds the repository with an already-known model, entering `Ready`
    /// without contacting the backend.
    pub fn with_initial(self, model: C::Model) -> Self {
        self.shared.cell.set(RepositoryState::Ready(model));
        self
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Handler for pipeline errors; replaces any previous handler. Without
    /// one, errors are logged.
    pub fn set_error_handler(&self, handler: impl Fn(DocstoreError) + Send + Sync + 'static) {
        self.shared.errors.set(handler);
    }

    pub fn current(&self) -> RepositoryState<C::Model> {
        self.shared.cell.current()
    }

    /// The last-known model, if a snapshot has arrived.
    pub fn object(&self) -> Option<C::Model> {
        self.shared.cell.current().into_value()
    }

    /// Opens a stream of state transitions, starting with the current state
    /// (unless the repository is untouched).
    pub fn watch(&self) -> async_channel::Receiver<RepositoryState<C::Model>> {
        self.shared.cell.watch()
    }

    /// Reads the document once and replaces the held model. A missing
    /// document surfaces as `NotFound` on the error handler.
    pub async fn fetch(&self) {
        if self.shared.cell.is_disposed() {
            return;
        }
        self.shared.cell.begin_loading();
        match self
            .client
            .fetch_document(&self.reference, &self.object_id, &self.converter)
            .await
        {
            Ok(record) => self
                .shared
                .cell
                .set(RepositoryState::Ready(record.into_value())),
            Err(err) => self.shared.errors.emit(err),
        }
    }

    /// Starts a realtime listener on the document. Snapshots replace the
    /// held model in emission order; a repeated call replaces the previous
    /// backend subscription.
    pub async fn listen(&self) {
        if self.shared.cell.is_disposed() {
            return;
        }
        self.shared.cell.begin_loading();

        let shared = Arc::clone(&self.shared);
        let on_change: DocumentUpdateCallback<C::Model> = Arc::new(move |outcome| {
            if shared.cell.is_disposed() {
                return;
            }
            match outcome {
                Ok(record) => shared.cell.set(RepositoryState::Ready(record.into_value())),
                Err(err) => shared.errors.emit(err),
            }
        });

        match self
            .client
            .listen_document(&self.reference, &self.object_id, &self.converter, on_change)
            .await
        {
            Ok(key) => {
                *self.shared.listener_key.lock().expect("listener key poisoned") = Some(key);
            }
            Err(err) => self.shared.errors.emit(err),
        }
    }

    /// Stops the realtime listener, keeping the held model. Idempotent.
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

    /// Merges raw field values into the document.
    pub async fn update_fields(&self, fields: MapValue) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.forward_err(
            self.client
                .update_fields(&self.reference, &self.object_id, fields)
                .await,
        )
    }

    /// Overwrites (or merges into) the document with a full model.
    pub async fn update(&self, model: &C::Model, merge: bool) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.forward_err(
            self.client
                .update(&self.reference, &self.object_id, model, merge, &self.converter)
                .await,
        )
    }

    /// Deletes the document. The repository's own listener is removed first
    /// so the deletion does not echo back as a `NotFound` snapshot.
    pub async fn delete(&self) -> DocstoreResult<()> {
        self.guard_disposed()?;
        self.remove_listener();
        self.forward_err(self.client.delete(&self.reference, &self.object_id).await)
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

impl<C> Drop for ObjectRepository<C>
where
    C: DataConverter,
{
    fn drop(&mut self) {
        // A dropped repository must release its backend listener.
        self.dispose();
    }
}
