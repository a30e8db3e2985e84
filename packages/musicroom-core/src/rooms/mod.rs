//! Room actors.
//!
//! A room is one independent actor owning its state. Two kinds exist:
//!
//! - [`listening`]: a shared queue played in lockstep, driven by a playback
//!   state machine and a durable track timer
//! - [`playlist`]: a collaboratively edited track list, merging concurrent
//!   add-tracks requests
//!
//! Each room runs a single tokio task. All reads and writes of its state
//! happen inside that task's event loop; long-running work (metadata fetches,
//! the countdown timer) runs in separate tasks whose results are fed back into
//! the loop through a completion channel.

pub mod handle;
pub mod listening;
pub mod playlist;
pub mod signal;

pub use handle::RoomHandle;
pub use signal::{MoveDirection, Signal, SignalError};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendNotifier, TrackCatalog};
use crate::events::{EventEmitter, NoopEventEmitter};
use crate::protocol_constants::{
    QUERY_CHANNEL_CAPACITY, SIGNAL_CHANNEL_CAPACITY, TIMER_CHECKPOINT_INTERVAL_MS,
};
use crate::runtime::TokioSpawner;
use crate::timer::{LoggingHeartbeat, TimerHeartbeat};
use listening::ListeningRoomExposedState;
use playlist::PlaylistExposedState;

/// The two kinds of rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Listening,
    Playlist,
}

impl RoomKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Playlist => "playlist",
        }
    }
}

/// Point-in-time exposed state of a room, as answered to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoomSnapshot {
    Listening(ListeningRoomExposedState),
    Playlist(PlaylistExposedState),
}

impl RoomSnapshot {
    pub fn kind(&self) -> RoomKind {
        match self {
            Self::Listening(_) => RoomKind::Listening,
            Self::Playlist(_) => RoomKind::Playlist,
        }
    }
}

/// Collaborators injected into every room.
///
/// Cheap to clone: everything is behind an [`Arc`] or is a runtime handle.
#[derive(Clone)]
pub struct RoomDeps {
    pub notifier: Arc<dyn BackendNotifier>,
    pub catalog: Arc<dyn TrackCatalog>,
    pub emitter: Arc<dyn EventEmitter>,
    pub heartbeat: Arc<dyn TimerHeartbeat>,
    pub spawner: TokioSpawner,
    pub checkpoint_interval: Duration,
    pub signal_capacity: usize,
}

impl RoomDeps {
    /// Creates dependencies with a no-op emitter, a logging heartbeat and
    /// default channel sizing.
    pub fn new(
        notifier: Arc<dyn BackendNotifier>,
        catalog: Arc<dyn TrackCatalog>,
        spawner: TokioSpawner,
    ) -> Self {
        Self {
            notifier,
            catalog,
            emitter: Arc::new(NoopEventEmitter),
            heartbeat: Arc::new(LoggingHeartbeat),
            spawner,
            checkpoint_interval: Duration::from_millis(TIMER_CHECKPOINT_INTERVAL_MS),
            signal_capacity: SIGNAL_CHANNEL_CAPACITY,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Arc<dyn TimerHeartbeat>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity.max(1);
        self
    }

    /// Creates the inbound channels of a new room and the handle feeding them.
    pub(crate) fn channels(&self, room_id: &str, kind: RoomKind) -> (RoomHandle, handle::Inbox) {
        handle::channel(
            room_id,
            kind,
            self.signal_capacity,
            QUERY_CHANNEL_CAPACITY,
        )
    }
}
