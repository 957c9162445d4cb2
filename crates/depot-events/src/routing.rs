//! Broadcast routing with a bounded replay ring.

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
use chrono::Utc;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::Sender;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Stream handed to subscribers: replayed backlog first, then live events.
pub type EventStream = Pin<Box<dyn Stream<Item = EventEnvelope> + Send>>;

#[derive(Debug)]
struct Ring {
    next_id: EventId,
    capacity: usize,
    entries: VecDeque<EventEnvelope>,
}

impl Ring {
    fn push(&mut self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: self.next_id,
            timestamp: Utc::now(),
            event,
        };
        self.next_id = self.next_id.saturating_add(1);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(envelope.clone());
        envelope
    }
}

/// Promotion event bus: a `tokio::broadcast` channel fronted by a bounded
/// replay ring so late subscribers can resume from an event id.
///
/// Ids start at 1 and are assigned under the ring lock, so subscribers see
/// them in increasing order.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    ring: Arc<Mutex<Ring>>,
}

impl EventBus {
    /// Bus retaining at most `replay_capacity` events for replay.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        let capacity = replay_capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            ring: Arc::new(Mutex::new(Ring {
                next_id: 1,
                capacity,
                entries: VecDeque::with_capacity(capacity),
            })),
        }
    }

    /// Bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to the bus.
    ///
    /// When `last_event_id` is given, buffered events newer than it are
    /// yielded before live ones. Events dropped because the subscriber lagged
    /// are skipped.
    #[must_use]
    pub fn subscribe(&self, last_event_id: Option<EventId>) -> EventStream {
        let rx = self.sender.subscribe();
        let backlog = last_event_id.map_or_else(Vec::new, |last| self.backlog_since(last));
        let replayed_up_to = backlog.last().map_or(0, |env| env.id);
        let live = BroadcastStream::new(rx)
            .filter_map(Result::ok)
            .filter(move |env| env.id > replayed_up_to);
        Box::pin(tokio_stream::iter(backlog).chain(live))
    }

    /// Publish `event` and return the id it was assigned.
    pub fn publish(&self, event: Event) -> EventId {
        let mut ring = self.ring();
        let envelope = ring.push(event);
        let id = envelope.id;
        if self.sender.send(envelope).is_err() {
            debug!(event_id = id, "no live subscribers; event kept for replay only");
        }
        id
    }

    /// Id of the newest retained event.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.ring().entries.back().map(|env| env.id)
    }

    /// Retained events newer than `id`, oldest first.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.ring()
            .entries
            .iter()
            .filter(|env| env.id > id)
            .cloned()
            .collect()
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
