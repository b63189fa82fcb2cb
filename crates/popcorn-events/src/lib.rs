#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! In-process event bus connecting the loader with the rest of the application.
//!
//! The bus hands out sequential identifiers and keeps a bounded replay ring so a
//! late subscriber can catch up on recent events. Delivery uses
//! `tokio::broadcast`; a lagging subscriber skips the overflowed events.

pub mod payloads;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{trace, warn};

pub use payloads::{
    DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, MediaPlayback, PlayRequest,
};

/// Returned by [`EventBus::publish_delivered`] when nobody was listening.
///
/// The event is still recorded in the replay ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event has no subscribers")]
pub struct EventBusError {
    /// Identifier assigned to the event.
    pub event_id: EventId,
    /// Kind of the undelivered event.
    pub event_kind: &'static str,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus; a zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it a sequential identifier.
    ///
    /// Events published without an active subscriber are kept for replay only.
    pub fn publish(&self, event: Event) -> EventId {
        match self.publish_delivered(event) {
            Ok(id) => id,
            Err(err) => {
                trace!(
                    event_id = err.event_id,
                    event_kind = err.event_kind,
                    "event published without subscribers"
                );
                err.event_id
            }
        }
    }

    /// Publish an event and report whether at least one subscriber received it.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] when nobody is listening.
    pub fn publish_delivered(&self, event: Event) -> Result<EventId, EventBusError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event_kind = event.kind();
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        self.sender
            .send(envelope)
            .map(|_| id)
            .map_err(|_| EventBusError {
                event_id: id,
                event_kind,
            })
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<EventEnvelope> = since_id.map_or_else(VecDeque::new, |since| {
            self.lock_buffer()
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });
        let replayed_up_to = backlog.back().map_or(0, |envelope| envelope.id);

        EventStream {
            backlog,
            receiver,
            replayed_up_to,
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_buffer().back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    replayed_up_to: EventId,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    ///
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                // already yielded from the backlog
                Ok(event) if event.id <= self.replayed_up_to => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
