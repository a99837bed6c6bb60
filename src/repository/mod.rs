mod collection;
mod object;

pub use collection::CollectionRepository;
pub use object::ObjectRepository;

use std::sync::Mutex;

use crate::error::DocstoreError;

/// Lifecycle of a reactive repository's held value.
///
/// `Loading` is entered on the first fetch or listen call; every successful
/// refresh moves `Ready -> Ready` with the new value (overwrite, not merge;
/// the backend always delivers full snapshots). A failed refresh never
/// leaves `Ready`; the error travels through the repository's error handler
/// instead. `Disposed` is terminal.
#[derive(Clone, Debug, PartialEq)]
pub enum RepositoryState<T> {
    Uninitialized,
    Loading,
    Ready(T),
    Disposed,
}

impl<T> RepositoryState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, RepositoryState::Ready(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, RepositoryState::Disposed)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            RepositoryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            RepositoryState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Shared state cell backing a repository: the current state plus the
/// senders of every open watch stream.
///
/// State changes and their publication happen under one lock, so observers
/// see transitions in the order they were applied.
pub(crate) struct StateCell<T> {
    inner: Mutex<CellInner<T>>,
}

struct CellInner<T> {
    state: RepositoryState<T>,
    observers: Vec<async_channel::Sender<RepositoryState<T>>>,
}

impl<T: Clone> StateCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(CellInner {
                state: RepositoryState::Uninitialized,
                observers: Vec::new(),
            }),
        }
    }

    pub(crate) fn current(&self) -> RepositoryState<T> {
        self.inner.lock().expect("repository state poisoned").state.clone()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.current().is_disposed()
    }

    /// Applies `next` and publishes it to every open watch stream. No-op
    /// once disposed.
    pub(crate) fn set(&self, next: RepositoryState<T>) {
        let mut inner = self.inner.lock().expect("repository state poisoned");
        if inner.state.is_disposed() {
            return;
        }
        inner.state = next.clone();
        inner
            .observers
            .retain(|observer| observer.try_send(next.clone()).is_ok());
    }

    /// Enters `Loading` if the repository has never produced a value yet.
    /// Refreshes of an already-`Ready` repository keep the last good value
    /// visible while the new snapshot is in flight.
    pub(crate) fn begin_loading(&self) {
        let mut inner = self.inner.lock().expect("repository state poisoned");
        if matches!(inner.state, RepositoryState::Uninitialized) {
            inner.state = RepositoryState::Loading;
            let next = inner.state.clone();
            inner
                .observers
                .retain(|observer| observer.try_send(next.clone()).is_ok());
        }
    }

    /// Opens a watch stream. The current state is replayed as the first
    /// item unless the repository is still untouched.
    pub(crate) fn watch(&self) -> async_channel::Receiver<RepositoryState<T>> {
        let (sender, receiver) = async_channel::unbounded();
        let mut inner = self.inner.lock().expect("repository state poisoned");
        if !matches!(inner.state, RepositoryState::Uninitialized) {
            let _ = sender.try_send(inner.state.clone());
        }
        inner.observers.push(sender);
        receiver
    }

    /// Moves to `Disposed`, publishes the transition, and closes all watch
    /// streams. Idempotent.
    pub(crate) fn dispose(&self) {
        let mut inner = self.inner.lock().expect("repository state poisoned");
        if inner.state.is_disposed() {
            return;
        }
        inner.state = RepositoryState::Disposed;
        for observer in inner.observers.drain(..) {
            let _ = observer.try_send(RepositoryState::Disposed);
            observer.close();
        }
    }
}

/// Error side channel shared by both repository forms; mirrors an
/// overridable `did_receive_error` hook. Errors land here instead of
/// corrupting the held state.
pub(crate) struct ErrorHook {
    handler: Mutex<Option<Box<dyn Fn(DocstoreError) + Send + Sync>>>,
}

impl ErrorHook {
    pub(crate) fn new() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }

    pub(crate) fn set(&self, handler: impl Fn(DocstoreError) + Send + Sync + 'static) {
        *self.handler.lock().expect("error handler poisoned") = Some(Box::new(handler));
    }

    pub(crate) fn emit(&self, error: DocstoreError) {
        let handler = self.handler.lock().expect("error handler poisoned");
        match handler.as_ref() {
            Some(handler) => handler(error),
            None => log::warn!("unhandled repository error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_replays_last_value_to_new_observers() {
        let cell = StateCell::new();
        cell.set(RepositoryState::Ready(1));
        let receiver = cell.watch();
        assert_eq!(receiver.try_recv().unwrap(), RepositoryState::Ready(1));
    }

    #[test]
    fn untouched_cell_replays_nothing() {
        let cell: StateCell<i32> = StateCell::new();
        let receiver = cell.watch();
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn dispose_closes_streams_and_pins_state() {
        let cell = StateCell::new();
        let receiver = cell.watch();
        cell.set(RepositoryState::Ready(1));
        cell.dispose();
        cell.set(RepositoryState::Ready(2));

        assert_eq!(receiver.try_recv().unwrap(), RepositoryState::Ready(1));
        assert_eq!(receiver.try_recv().unwrap(), RepositoryState::Disposed);
        assert!(receiver.try_recv().is_err());
        assert!(cell.is_disposed());
    }

    #[test]
    fn begin_loading_only_from_uninitialized() {
        let cell = StateCell::new();
        cell.begin_loading();
        assert_eq!(cell.current(), RepositoryState::<i32>::Loading);

        cell.set(RepositoryState::Ready(1));
        cell.begin_loading();
        assert_eq!(cell.current(), RepositoryState::Ready(1));
    }
}
