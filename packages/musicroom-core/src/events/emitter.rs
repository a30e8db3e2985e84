//! Event emitter abstraction for decoupling rooms from transport.
//!
//! Rooms depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, so tests can count events and the server can fan them out.

use super::{BackendEvent, RoomEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct Room {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl Room {
///     fn on_join(&self, user_id: String) {
///         self.emitter.emit_room(RoomEvent::UserJoined { ... });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a room lifecycle or state-change event.
    fn emit_room(&self, event: RoomEvent);

    /// Emits a backend health event.
    fn emit_backend(&self, event: BackendEvent);
}

/// No-op emitter for tests and headless embedding.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_room(&self, _event: RoomEvent) {}

    fn emit_backend(&self, _event: BackendEvent) {}
}

/// Logging emitter for debugging and development.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_room(&self, event: RoomEvent) {
        tracing::debug!(room_id = event.room_id(), ?event, "room_event");
    }

    fn emit_backend(&self, event: BackendEvent) {
        tracing::debug!(?event, "backend_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEventEmitter {
        room_count: AtomicUsize,
        backend_count: AtomicUsize,
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_room(&self, _event: RoomEvent) {
            self.room_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_backend(&self, _event: BackendEvent) {
            self.backend_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_is_usable_as_trait_object() {
        let counting = Arc::new(CountingEventEmitter {
            room_count: AtomicUsize::new(0),
            backend_count: AtomicUsize::new(0),
        });
        let emitter: Arc<dyn EventEmitter> = counting.clone();

        emitter.emit_room(RoomEvent::Terminated {
            room_id: "r1".into(),
            timestamp: 0,
        });
        emitter.emit_backend(BackendEvent::HealthChanged {
            reachable: true,
            reason: None,
            timestamp: 0,
        });
        emitter.emit_room(RoomEvent::PlaybackChanged {
            room_id: "r1".into(),
            playing: true,
            timestamp: 0,
        });

        assert_eq!(counting.room_count.load(Ordering::SeqCst), 2);
        assert_eq!(counting.backend_count.load(Ordering::SeqCst), 1);
    }
}
