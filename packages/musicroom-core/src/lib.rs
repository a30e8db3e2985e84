//! MusicRoom Core - shared library for collaborative listening rooms.
//!
//! Two kinds of rooms run side by side, each as an independent actor:
//!
//! - **Listening rooms** play a shared queue in lockstep for every member.
//!   A playback state machine drives a durable per-track countdown timer.
//! - **Playlists** are collaboratively edited track lists. Concurrent
//!   add-tracks requests are merged without ever duplicating a track.
//!
//! # Architecture
//!
//! - [`rooms`]: room actors, their state, signals and handles
//! - [`timer`]: the durable track timer and its checkpoints
//! - [`backend`]: rendering backend notifier and track catalog clients
//! - [`services`]: room registry and checkpoint store
//! - [`events`]: domain events for real-time client communication
//! - [`api`]: HTTP and WebSocket surface
//! - [`bootstrap`]: composition root
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! Rooms depend on traits rather than concrete collaborators:
//!
//! - [`BackendNotifier`](backend::BackendNotifier): play/pause and ack notifications
//! - [`TrackCatalog`](backend::TrackCatalog): track metadata resolution
//! - [`EventEmitter`](events::EventEmitter): emitting domain events
//! - [`TimerHeartbeat`](timer::TimerHeartbeat): timer liveness checkpoints
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod backend;
pub mod bootstrap;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod rooms;
pub mod runtime;
pub mod services;
pub mod state;
pub mod timer;
pub mod track;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use backend::{
    BackendNotifier, CatalogError, HttpBackendNotifier, HttpTrackCatalog, NotifierError,
    TrackCatalog,
};
pub use error::{CatalogResult, ErrorCode, NotifierResult, RoomError, RoomResult};
pub use events::{
    BackendEvent, BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter,
    NoopEventEmitter, RoomEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use timer::{TimerHeartbeat, TimerPhase, TimerState};
pub use track::{Track, TrackId};
pub use utils::now_millis;

// Re-export room types
pub use rooms::listening::{ListeningRoomExposedState, ListeningRoomParams};
pub use rooms::playlist::{PlaylistExposedState, PlaylistParams};
pub use rooms::{RoomDeps, RoomHandle, RoomKind, RoomSnapshot, Signal, SignalError};

// Re-export service types
pub use services::{CheckpointStore, RoomRegistry, RoomSummary};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError, WsConnectionManager};
