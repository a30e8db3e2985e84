//! Bridge implementation that maps domain events to broadcast transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BackendEvent, BroadcastEvent, RoomEvent};

/// Bridges domain events to the WebSocket broadcast channel.
///
/// Every event is also forwarded to an optional secondary emitter, which the
/// composition root uses to keep a [`LoggingEventEmitter`](super::LoggingEventEmitter)
/// attached in debug setups.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    secondary: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; [`Config::validate`](crate::Config::validate)
    /// rejects that value.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            secondary: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets a secondary emitter receiving a copy of every event.
    pub fn set_secondary_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.secondary.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    fn broadcast(&self, event: BroadcastEvent) {
        if let Err(e) = self.tx.send(event) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit_room(&self, event: RoomEvent) {
        if let Some(ref emitter) = *self.secondary.read() {
            emitter.emit_room(event.clone());
        }
        self.broadcast(BroadcastEvent::Room(event));
    }

    fn emit_backend(&self, event: BackendEvent) {
        if let Some(ref emitter) = *self.secondary.read() {
            emitter.emit_backend(event.clone());
        }
        self.broadcast(BroadcastEvent::Backend(event));
    }
}
