use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Cancel capability for one live backend watch.
///
/// Owned exclusively by the [`ListenerRegistry`] once registered. Cancelling
/// is idempotent, and dropping an uncancelled registration cancels it, so a
/// displaced or forgotten handle can never leak a backend-side listener.
pub struct WatchRegistration {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchRegistration {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for WatchRegistration {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for WatchRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistration")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

/// Table of live watches keyed by query cache key or document path.
///
/// Lifetime-scoped: construct one per client (or share one across clients
/// via `Arc`) instead of relying on process-global state, so tests can use
/// isolated instances. At most one watch is live per key; registering a key
/// that is already live cancels the previous watch before the new one takes
/// its place.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<HashMap<String, WatchRegistration>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `registration` under `key`, cancelling any watch the key
    /// previously held (cancel-then-replace).
    pub fn register(&self, key: impl Into<String>, registration: WatchRegistration) {
        let displaced = self
            .entries
            .lock()
            .expect("listener registry poisoned")
            .insert(key.into(), registration);
        // Cancel outside the lock: cancellation may call back into the backend.
        if let Some(displaced) = displaced {
            displaced.cancel();
        }
    }

    /// Cancels and removes the watch for `key`. Idempotent; unknown keys are
    /// a no-op.
    pub fn remove(&self, key: &str) {
        let removed = self
            .entries
            .lock()
            .expect("listener registry poisoned")
            .remove(key);
        if let Some(removed) = removed {
            removed.cancel();
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("listener registry poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("listener registry poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every live watch. Called on teardown.
    pub fn clear(&self) {
        let drained: Vec<WatchRegistration> = {
            let mut entries = self.entries.lock().expect("listener registry poisoned");
            entries.drain().map(|(_, registration)| registration).collect()
        };
        for registration in drained {
            registration.cancel();
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("active", &self.len())
            .finish()
    }
}
