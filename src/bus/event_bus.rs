use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::ClientEvent;

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    pub seq: i64,
    #[serde(flatten)]
    pub event: ClientEvent,
    pub created_at: String,
}

pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    seq: AtomicI64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            seq: AtomicI64::new(0),
        }
    }

    /// Stamp and publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: ClientEvent) -> BusEvent {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stamped = BusEvent {
            id: Uuid::new_v4().to_string(),
            seq,
            event,
            created_at: Utc::now().to_rfc3339(),
        };
        if self.tx.receiver_count() > 0 {
            if let Err(e) = self.tx.send(stamped.clone()) {
                tracing::trace!("event bus publish dropped: {e}");
            }
        }
        stamped
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}
