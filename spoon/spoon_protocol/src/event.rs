//! Observable event stream.
//!
//! Actors publish one event per ownership transfer and one per consume.
//! Subscribers receive them over unbounded `crossbeam_channel` queues so a
//! slow or absent reader never stalls an actor.
//!
//! Subscriptions are collected on an [`EventBus`]. A run publishes through an
//! [`EventSink`], a frozen copy of the subscriber list taken at start, so
//! publishing takes no lock and the resource stays the only point actors
//! synchronize on.
//!
//! Events from different actors may arrive slightly out of order; `sequence`
//! is the resource version assigned inside the critical section and gives
//! the true order.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::id::ActorId;

/// What happened to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Ownership moved from the event's actor to `to`
    Transferred {
        /// New owner
        to: ActorId,
    },

    /// The event's actor used the resource and is now satisfied
    Consumed,
}

/// One observable protocol event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolEvent {
    /// Resource version produced by this mutation
    pub sequence: u64,

    /// Step number of the decision that caused it
    pub step: u64,

    /// Actor that performed the mutation
    pub actor: ActorId,

    /// The mutation itself
    pub kind: EventKind,
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Transferred { to } => write!(
                f,
                "#{} step {}: {} -> {}",
                self.sequence, self.step, self.actor, to
            ),
            EventKind::Consumed => write!(
                f,
                "#{} step {}: {} consumed",
                self.sequence, self.step, self.actor
            ),
        }
    }
}

/// Fan-out of protocol events to any number of subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<ProtocolEvent>>>,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new stream receiving every event of runs started from now on
    pub fn subscribe(&self) -> EventStream {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        EventStream { receiver }
    }

    /// Freeze the current subscribers into a sink for one run.
    ///
    /// Streams opened afterwards do not receive that run's events.
    pub fn sink(&self) -> EventSink {
        EventSink {
            senders: self.subscribers.lock().iter().cloned().collect(),
        }
    }

    /// Number of subscriptions opened so far
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Publishing end of an [`EventBus`] for one run
#[derive(Debug, Clone)]
pub struct EventSink {
    senders: Arc<[Sender<ProtocolEvent>]>,
}

impl EventSink {
    /// Deliver an event to every subscriber; closed streams are skipped
    pub fn publish(&self, event: ProtocolEvent) {
        for sender in self.senders.iter() {
            let _ = sender.send(event);
        }
    }
}

/// Receiving end of an [`EventBus`] subscription
#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<ProtocolEvent>,
}

impl EventStream {
    /// Take every event currently queued without blocking
    pub fn drain(&self) -> Vec<ProtocolEvent> {
        self.receiver.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout or once every publisher is gone and the queue
    /// is empty.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ProtocolEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocking iterator that ends once the bus and its sinks are dropped
    pub fn iter(&self) -> impl Iterator<Item = ProtocolEvent> + '_ {
        self.receiver.iter()
    }
}
