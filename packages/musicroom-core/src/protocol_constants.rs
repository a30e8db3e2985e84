//! Fixed protocol constants that should NOT be changed.
//!
//! These values are shared with the rendering backend and the signal
//! producers; changing them breaks compatibility with existing peers.

// ─────────────────────────────────────────────────────────────────────────────
// Durable Timer
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between liveness checkpoints emitted by a running track timer (milliseconds).
///
/// A supervisor that misses checkpoints for longer than this considers the
/// timer task dead and restarts it from the last reported progress.
pub const TIMER_CHECKPOINT_INTERVAL_MS: u64 = 2000;

// ─────────────────────────────────────────────────────────────────────────────
// Backend HTTP Endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe on the rendering backend.
pub const BACKEND_PING_PATH: &str = "/ping";

/// Prefix for play notifications; the room ID is appended as a path segment.
pub const BACKEND_PLAY_PATH: &str = "/temporal/play";

/// Prefix for pause notifications; the room ID is appended as a path segment.
pub const BACKEND_PAUSE_PATH: &str = "/temporal/pause";

/// Listening room creation acknowledgement.
pub const BACKEND_ROOM_CREATION_ACK_PATH: &str = "/temporal/mtv-creation-acknowledgement";

/// Listening room join acknowledgement.
pub const BACKEND_JOIN_PATH: &str = "/temporal/join";

/// Playlist creation acknowledgement.
pub const BACKEND_PLAYLIST_CREATION_ACK_PATH: &str = "/temporal/mpe/creation-acknowledgement";

/// Catalog endpoint resolving track IDs to metadata.
pub const CATALOG_RESOLVE_PATH: &str = "/tracks/resolve";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for backend and catalog HTTP requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of each room's inbound signal channel.
pub const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Capacity of each room's query channel.
pub const QUERY_CHANNEL_CAPACITY: usize = 16;

/// Capacity of the domain event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// First port tried when no preferred port is configured.
pub const SERVER_PORT_RANGE_START: u16 = 49500;

/// Last port tried when no preferred port is configured.
pub const SERVER_PORT_RANGE_END: u16 = 49510;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket heartbeat timeout (seconds).
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Interval between WebSocket heartbeat checks (seconds).
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "musicroom";
