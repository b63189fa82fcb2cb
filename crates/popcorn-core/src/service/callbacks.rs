use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Identifier returned when subscribing a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackHandle(pub u64);

type Callback<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Thread-safe registry of push-notification callbacks.
///
/// Callbacks are invoked outside of the registry lock, so a callback may
/// unsubscribe itself without deadlocking.
pub struct Callbacks<E> {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<CallbackHandle, Callback<E>>>,
}

impl<E: Clone> Callbacks<E> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a callback and return its handle.
    pub fn add(&self, callback: Arc<dyn Fn(E) + Send + Sync>) -> CallbackHandle {
        let handle = CallbackHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(handle, callback);
        handle
    }

    /// Remove a callback; returns `false` when the handle was unknown.
    pub fn remove(&self, handle: CallbackHandle) -> bool {
        self.lock().remove(&handle).is_some()
    }

    /// Invoke every registered callback with a clone of `event`.
    pub fn invoke(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self.lock().values().cloned().collect();
        for callback in snapshot {
            callback(event.clone());
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CallbackHandle, Callback<E>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<E: Clone> Default for Callbacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Callbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn removed_callbacks_are_not_invoked() {
        let callbacks = Callbacks::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let handle = callbacks.add(Arc::new(move |value: u32| {
            counter.fetch_add(value as usize, Ordering::SeqCst);
        }));
        callbacks.invoke(&2);
        assert!(callbacks.remove(handle));
        assert!(!callbacks.remove(handle));
        callbacks.invoke(&5);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(callbacks.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let callbacks = Arc::new(Callbacks::<()>::new());
        let slot = Arc::new(Mutex::new(None::<CallbackHandle>));

        let registry = Arc::clone(&callbacks);
        let own = Arc::clone(&slot);
        let handle = callbacks.add(Arc::new(move |(): ()| {
            if let Some(handle) = *own.lock().expect("slot") {
                registry.remove(handle);
            }
        }));
        *slot.lock().expect("slot") = Some(handle);

        callbacks.invoke(&());
        assert_eq!(callbacks.len(), 0);
    }
}
