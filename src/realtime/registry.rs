//! # Subscriber Registry
//!
//! The one piece of mutable shared state in the pipeline: the live set of
//! WebSocket subscribers. Each member is represented by the sending half of
//! a per-connection queue; the connection task owns the receiving half and
//! forwards to the socket, so per-subscriber message order follows broadcast
//! call order.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Messages buffered per subscriber before it is treated as dead
const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// Opaque handle for one registered subscriber
pub type ConnectionId = Uuid;

/// Registry and broadcaster for realtime subscribers
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: Mutex<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    ///
    /// The returned receiver is owned by the connection task; every
    /// broadcast after this call is queued onto it in call order.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = Uuid::new_v4();
        self.members.lock().await.insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.members.lock().await.remove(&id);
    }

    /// Deliver `message` to every current subscriber, returning the number
    /// of successful deliveries.
    ///
    /// The mutex is held for the whole sweep, which serializes concurrent
    /// broadcasts (direct path and listener path can race) so every
    /// subscriber queue observes the same global order. Delivery itself
    /// never waits on a peer: a closed channel or a full queue (a peer that
    /// stopped draining) counts as a failed delivery. Failed members are
    /// collected during the sweep and removed after it, so one bad peer can
    /// neither stall the broadcast nor cut delivery short for the others.
    pub async fn broadcast(&self, message: &str) -> usize {
        let mut members = self.members.lock().await;

        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in members.iter() {
            if tx.try_send(message.to_string()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            members.remove(&id);
        }

        delivered
    }

    /// Current membership size
    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Whether the registry has no subscribers
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }
}
