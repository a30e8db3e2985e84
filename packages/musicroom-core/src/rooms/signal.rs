//! External signals delivered to rooms.
//!
//! Every signal is a JSON object tagged with a `route` discriminator, e.g.
//! `{"route":"JOIN","userID":"u1"}`. Signals are parsed at the edge so a
//! malformed payload never reaches a room loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RoomKind;
use crate::backend::Initiator;
use crate::track::TrackId;

/// Errors raised while turning a raw payload into a [`Signal`].
#[derive(Debug, Error)]
pub enum SignalError {
    /// Payload is not valid JSON or does not match any route.
    #[error("Malformed signal: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Route exists but the target room kind does not handle it.
    #[error("Route {route} is not handled by {kind} rooms")]
    Unroutable { route: String, kind: &'static str },
}

/// Direction of a single-step track move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveDirection {
    Up,
    Down,
}

/// A signal accepted by a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Play,
    Pause,
    Join {
        #[serde(rename = "userID")]
        user_id: String,
    },
    AddTracks {
        #[serde(rename = "trackIDs")]
        track_ids: Vec<TrackId>,
        #[serde(rename = "userID")]
        user_id: String,
        #[serde(rename = "deviceID")]
        device_id: String,
    },
    ChangeTrackOrder {
        #[serde(rename = "trackID")]
        track_id: TrackId,
        #[serde(rename = "fromIndex")]
        from_index: usize,
        #[serde(rename = "operationToApply")]
        operation_to_apply: MoveDirection,
        #[serde(rename = "userID")]
        user_id: String,
        #[serde(rename = "deviceID")]
        device_id: String,
    },
    DeleteTracks {
        #[serde(rename = "trackIDs")]
        track_ids: Vec<TrackId>,
        #[serde(rename = "userID")]
        user_id: String,
        #[serde(rename = "deviceID")]
        device_id: String,
    },
    Terminate,
}

impl Signal {
    /// Parses a signal from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SignalError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses a signal from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, SignalError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of the signal's route.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Join { .. } => "JOIN",
            Self::AddTracks { .. } => "ADD_TRACKS",
            Self::ChangeTrackOrder { .. } => "CHANGE_TRACK_ORDER",
            Self::DeleteTracks { .. } => "DELETE_TRACKS",
            Self::Terminate => "TERMINATE",
        }
    }

    /// Checks that a room of `kind` handles this route.
    pub fn ensure_routable(&self, kind: RoomKind) -> Result<(), SignalError> {
        let handled = match self {
            Self::Terminate => true,
            Self::Play | Self::Pause | Self::Join { .. } => kind == RoomKind::Listening,
            Self::AddTracks { .. } | Self::ChangeTrackOrder { .. } | Self::DeleteTracks { .. } => {
                kind == RoomKind::Playlist
            }
        };
        if handled {
            Ok(())
        } else {
            Err(SignalError::Unroutable {
                route: self.route().to_string(),
                kind: kind.as_str(),
            })
        }
    }

    /// User and device behind a playlist edit.
    pub fn initiator(&self) -> Option<Initiator> {
        match self {
            Self::AddTracks {
                user_id, device_id, ..
            }
            | Self::ChangeTrackOrder {
                user_id, device_id, ..
            }
            | Self::DeleteTracks {
                user_id, device_id, ..
            } => Some(Initiator::new(user_id.clone(), device_id.clone())),
            _ => None,
        }
    }
}
