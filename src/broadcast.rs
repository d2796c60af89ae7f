use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::alert::AlertTrigger;
use crate::ops::AnalyticsPayload;

/// Envelope fanned out to subscribers: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum OutboundMessage {
    Analytics(AnalyticsPayload),
    Alert(AlertTrigger),
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<OutboundMessage>,
}

/// Best-effort fan-out hub.
///
/// Delivery is non-blocking: a subscriber whose channel is closed or full at
/// send time is removed from the set without affecting the others.
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: Mutex<u64>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Register a new subscriber with the given channel capacity.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = {
            let mut next_id = self.next_id.lock().expect("broadcaster mutex poisoned");
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.subscribers
            .lock()
            .expect("broadcaster mutex poisoned")
            .push(Subscriber { id, tx });
        rx
    }

    /// Deliver to every live subscriber, pruning any whose send fails.
    /// Returns the number of subscribers reached.
    pub fn broadcast(&self, message: &OutboundMessage) -> usize {
        let mut subscribers = self.subscribers.lock().expect("broadcaster mutex poisoned");
        subscribers.retain(|sub| match sub.tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(subscriber = sub.id, error = %e, "Removing unreachable subscriber");
                false
            }
        });
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("broadcaster mutex poisoned")
            .len()
    }
}
