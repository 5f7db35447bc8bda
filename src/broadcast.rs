//! Fan-out of [`ServerEvent`]s to every attached client.
//!
//! Built on `tokio::sync::broadcast`: each client attachment holds a
//! receiver, emitting never blocks, and a receiver that falls behind loses
//! the oldest events (best-effort delivery).

use tokio::sync::broadcast;

use crate::events::ServerEvent;

/// Events buffered per receiver before it starts lagging.
pub const HUB_CHANNEL_CAP: usize = 256;

/// Clone freely; all clones share one channel.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(HUB_CHANNEL_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new client. It receives every event emitted from now on.
    pub fn attach(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Send to all attached clients. Having none attached is not an error.
    pub fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn attached(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
