//! Channel-backed implementations of the collaborator traits.
//!
//! The backend may push events for a handle before the reply that announces
//! it has been processed, and before the caller had a chance to subscribe.
//! Those events are held back and replayed, in arrival order, to the first
//! subscriber of the handle.

mod stream;
mod subtitle;
mod torrent;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use popcorn_core::{CallbackHandle, Callbacks};
use tracing::{debug, warn};

pub use stream::{ChannelStream, ChannelStreamService};
pub use subtitle::ChannelSubtitleService;
pub use torrent::{ChannelTorrent, ChannelTorrentService};

/// Upper bound of events held back per handle and per registry.
const MAX_HELD_EVENTS: usize = 64;

/// Backend object receiving routed push notifications.
trait Routed {
    type Event;

    fn deliver(&self, event: Self::Event);
}

/// Subscribers of one backend object.
///
/// Until the first subscriber arrives, events are kept in a backlog.
#[derive(Debug)]
struct Relay<E> {
    callbacks: Callbacks<E>,
    backlog: Mutex<Option<Vec<E>>>,
}

impl<E: Clone> Relay<E> {
    fn new() -> Self {
        Self {
            callbacks: Callbacks::new(),
            backlog: Mutex::new(Some(Vec::new())),
        }
    }

    fn deliver(&self, event: E) {
        {
            let mut backlog = lock(&self.backlog);
            if let Some(pending) = backlog.as_mut() {
                if pending.len() < MAX_HELD_EVENTS {
                    pending.push(event);
                } else {
                    warn!("dropping event, backlog of unsubscribed handle is full");
                }
                return;
            }
        }
        self.callbacks.invoke(&event);
    }

    fn subscribe(&self, callback: Arc<dyn Fn(E) + Send + Sync>) -> CallbackHandle {
        // the backlog lock is held while replaying so live events queue behind it
        let mut backlog = lock(&self.backlog);
        let handle = self.callbacks.add(Arc::clone(&callback));
        for event in backlog.take().into_iter().flatten() {
            callback(event);
        }
        handle
    }

    fn unsubscribe(&self, handle: CallbackHandle) {
        self.callbacks.remove(handle);
    }
}

/// Live backend objects indexed by handle so push notifications can be routed.
struct Registry<K, V: Routed> {
    entries: Mutex<Entries<K, V>>,
}

struct Entries<K, V: Routed> {
    live: HashMap<K, Arc<V>>,
    /// Events of handles whose announcing reply has not been processed yet.
    early: HashMap<K, Vec<V::Event>>,
    early_count: usize,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Copy + fmt::Display,
    V: Routed,
{
    fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                live: HashMap::new(),
                early: HashMap::new(),
                early_count: 0,
            }),
        }
    }

    /// Register `value` and hand it the events that arrived ahead of it.
    fn insert(&self, key: K, value: Arc<V>) {
        let mut entries = lock(&self.entries);
        if let Some(early) = entries.early.remove(&key) {
            entries.early_count -= early.len();
            debug!(handle = %key, count = early.len(), "replaying early events");
            for event in early {
                value.deliver(event);
            }
        }
        entries.live.insert(key, value);
    }

    fn remove(&self, key: K) -> Option<Arc<V>> {
        let mut entries = lock(&self.entries);
        if let Some(early) = entries.early.remove(&key) {
            entries.early_count -= early.len();
        }
        entries.live.remove(&key)
    }

    fn route(&self, key: K, event: V::Event) {
        let target = {
            let mut entries = lock(&self.entries);
            match entries.live.get(&key) {
                Some(target) => Arc::clone(target),
                None => {
                    if entries.early_count < MAX_HELD_EVENTS {
                        debug!(handle = %key, "holding event of unknown handle");
                        entries.early_count += 1;
                        entries.early.entry(key).or_default().push(event);
                    } else {
                        warn!(handle = %key, "dropping event of unknown handle");
                    }
                    return;
                }
            }
        };
        target.deliver(event);
    }
}

impl<K, V: Routed> fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = lock(&self.entries);
        f.debug_struct("Registry")
            .field("live", &entries.live.len())
            .field("early", &entries.early_count)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct Target {
        relay: Relay<u32>,
    }

    impl Routed for Target {
        type Event = u32;

        fn deliver(&self, event: u32) {
            self.relay.deliver(event);
        }
    }

    fn recorder() -> (Arc<StdMutex<Vec<u32>>>, Arc<dyn Fn(u32) + Send + Sync>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (
            seen,
            Arc::new(move |event| sink.lock().expect("seen").push(event)),
        )
    }

    #[test]
    fn first_subscriber_receives_held_events_in_order() {
        let relay = Relay::new();
        relay.deliver(1);
        relay.deliver(2);

        let (seen, callback) = recorder();
        let handle = relay.subscribe(callback);
        relay.deliver(3);

        assert_eq!(*seen.lock().expect("seen"), vec![1, 2, 3]);

        relay.unsubscribe(handle);
        relay.deliver(4);
        assert_eq!(seen.lock().expect("seen").len(), 3);
    }

    #[test]
    fn events_of_unknown_handles_reach_the_registered_object() {
        let registry = Registry::<u64, Target>::new();
        registry.route(7, 10);
        registry.route(8, 99);

        let target = Arc::new(Target {
            relay: Relay::new(),
        });
        registry.insert(7, Arc::clone(&target));
        registry.route(7, 11);

        let (seen, callback) = recorder();
        target.relay.subscribe(callback);
        assert_eq!(*seen.lock().expect("seen"), vec![10, 11]);

        assert!(registry.remove(8).is_none());
        assert_eq!(lock(&registry.entries).early_count, 0);
    }

    #[test]
    fn held_events_are_bounded() {
        let registry = Registry::<u64, Target>::new();
        for event in 0..100 {
            registry.route(1, event);
        }
        assert_eq!(lock(&registry.entries).early_count, MAX_HELD_EVENTS);
    }
}
