//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for rooms to emit domain events
//! - [`BroadcastEventBridge`] for WebSocket transport
//! - Event types for room lifecycle and backend health

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::backend::PlaylistOperation;
use crate::rooms::RoomKind;
use crate::track::{Track, TrackId};

/// Events broadcast to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from room actors.
    Room(RoomEvent),

    /// Events about the rendering backend's reachability.
    Backend(BackendEvent),
}

/// Observable changes of a room, emitted after the change was applied.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoomEvent {
    /// A room finished its creation sequence and accepts signals.
    Created {
        #[serde(rename = "roomID")]
        room_id: String,
        kind: RoomKind,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A listening room started or stopped playing.
    PlaybackChanged {
        #[serde(rename = "roomID")]
        room_id: String,
        playing: bool,
        timestamp: u64,
    },
    /// A listening room advanced its queue to a new track.
    TrackChanged {
        #[serde(rename = "roomID")]
        room_id: String,
        track: Track,
        timestamp: u64,
    },
    /// A user joined a listening room.
    UserJoined {
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "userID")]
        user_id: String,
        timestamp: u64,
    },
    /// Tracks were appended to a playlist.
    TracksAdded {
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "userID")]
        user_id: String,
        #[serde(rename = "trackIDs")]
        track_ids: Vec<TrackId>,
        timestamp: u64,
    },
    /// A playlist edit was refused.
    TracksRejected {
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "userID")]
        user_id: String,
        operation: PlaylistOperation,
        timestamp: u64,
    },
    /// A playlist was reordered or tracks were removed.
    PlaylistUpdated {
        #[serde(rename = "roomID")]
        room_id: String,
        operation: PlaylistOperation,
        #[serde(rename = "trackCount")]
        track_count: usize,
        timestamp: u64,
    },
    /// A room's loop stopped.
    Terminated {
        #[serde(rename = "roomID")]
        room_id: String,
        timestamp: u64,
    },
}

impl RoomEvent {
    /// ID of the room this event belongs to.
    pub fn room_id(&self) -> &str {
        match self {
            Self::Created { room_id, .. }
            | Self::PlaybackChanged { room_id, .. }
            | Self::TrackChanged { room_id, .. }
            | Self::UserJoined { room_id, .. }
            | Self::TracksAdded { room_id, .. }
            | Self::TracksRejected { room_id, .. }
            | Self::PlaylistUpdated { room_id, .. }
            | Self::Terminated { room_id, .. } => room_id,
        }
    }
}

/// Events related to the rendering backend.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BackendEvent {
    /// Backend reachability changed since the previous probe.
    HealthChanged {
        reachable: bool,
        /// Probe failure, when unreachable.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: u64,
    },
}

impl From<RoomEvent> for BroadcastEvent {
    fn from(event: RoomEvent) -> Self {
        BroadcastEvent::Room(event)
    }
}

impl From<BackendEvent> for BroadcastEvent {
    fn from(event: BackendEvent) -> Self {
        BroadcastEvent::Backend(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_event_serializes_with_category_and_type() {
        let event: BroadcastEvent = RoomEvent::UserJoined {
            room_id: "r1".into(),
            user_id: "u1".into(),
            timestamp: 7,
        }
        .into();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "room");
        assert_eq!(json["type"], "userJoined");
        assert_eq!(json["roomID"], "r1");
        assert_eq!(json["userID"], "u1");
    }

    #[test]
    fn track_change_carries_the_new_track() {
        let event = RoomEvent::TrackChanged {
            room_id: "r1".into(),
            track: Track {
                id: "t1".into(),
                title: "Title".into(),
                artist_name: "Artist".into(),
                duration_ms: 1_000,
            },
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["track"]["id"], "t1");
        assert_eq!(event.room_id(), "r1");
    }
}
