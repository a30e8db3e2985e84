//! External collaborators of the room core.
//!
//! Rooms talk to two services they do not own:
//!
//! - the rendering backend, told about every state change through a
//!   [`BackendNotifier`]
//! - the track catalog, asked for metadata through a [`TrackCatalog`]
//!
//! Both are injected as trait objects so rooms can be tested against mocks.
//! The [`http`] module provides the production implementations.

pub mod http;
pub(crate) mod retry;
pub mod traits;

pub use http::{HttpBackendNotifier, HttpTrackCatalog};
pub use traits::{BackendNotifier, PlaybackNotifier, PlaylistNotifier, TrackCatalog};

use serde::Serialize;
use thiserror::Error;

use crate::rooms::playlist::PlaylistExposedState;
use crate::track::Track;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while notifying the rendering backend.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// HTTP request to the backend failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// The configured backend URL cannot address this endpoint.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Convenient Result alias for notifier operations.
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Errors raised while resolving track metadata.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request to the catalog failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog answered with a non-success status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// The configured catalog URL cannot address this endpoint.
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    /// Catalog response is not aligned with the requested IDs.
    #[error("Catalog returned {actual} tracks not aligned with {expected} requested IDs")]
    Misaligned { expected: usize, actual: usize },
}

/// Convenient Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that may succeed when the same idempotent request is sent again.
pub(crate) trait TransientError {
    fn is_transient(&self) -> bool;
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl TransientError for NotifierError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus(status, _) => is_transient_status(*status),
            Self::InvalidUrl(_) => false,
        }
    }
}

impl TransientError for CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus(status, _) => is_transient_status(*status),
            Self::InvalidUrl(_) | Self::Misaligned { .. } => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload Types
// ─────────────────────────────────────────────────────────────────────────────

/// User and device that issued a playlist edit.
///
/// Forwarded to the catalog for attribution and echoed back to the backend
/// so it can answer the right device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Initiator {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

impl Initiator {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Kind of playlist edit being acknowledged or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistOperation {
    AddTracks,
    ChangeTrackOrder,
    DeleteTracks,
}

impl PlaylistOperation {
    /// Backend path acknowledging this operation.
    #[must_use]
    pub fn ack_path(self) -> &'static str {
        match self {
            Self::AddTracks => "/temporal/mpe/acknowledge-adding-tracks",
            Self::ChangeTrackOrder => "/temporal/mpe/acknowledge-change-track-order",
            Self::DeleteTracks => "/temporal/mpe/acknowledge-deleting-tracks",
        }
    }

    /// Backend path rejecting this operation.
    #[must_use]
    pub fn reject_path(self) -> &'static str {
        match self {
            Self::AddTracks => "/temporal/mpe/reject-adding-tracks",
            Self::ChangeTrackOrder => "/temporal/mpe/reject-change-track-order",
            Self::DeleteTracks => "/temporal/mpe/reject-deleting-tracks",
        }
    }
}

/// Body of an accepted playlist edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistUpdateAck {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(flatten)]
    pub initiator: Initiator,
    /// Tracks appended by an add-tracks request, in append order.
    #[serde(rename = "acceptedTracks", skip_serializing_if = "Vec::is_empty")]
    pub accepted_tracks: Vec<Track>,
    /// Playlist state right after the edit was applied.
    pub state: PlaylistExposedState,
}

/// Body of a rejected playlist edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistUpdateRejection {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(flatten)]
    pub initiator: Initiator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert!(NotifierError::HttpStatus(503, "unavailable".into()).is_transient());
        assert!(CatalogError::HttpStatus(429, "slow down".into()).is_transient());
        assert!(!NotifierError::HttpStatus(404, "missing".into()).is_transient());
    }

    #[test]
    fn misaligned_catalog_response_is_not_transient() {
        let err = CatalogError::Misaligned {
            expected: 2,
            actual: 1,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn rejection_flattens_initiator() {
        let rejection = PlaylistUpdateRejection {
            room_id: "room".into(),
            initiator: Initiator::new("user", "device"),
        };
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["roomID"], "room");
        assert_eq!(json["userID"], "user");
        assert_eq!(json["deviceID"], "device");
    }

    #[test]
    fn each_operation_has_distinct_paths() {
        for op in [
            PlaylistOperation::AddTracks,
            PlaylistOperation::ChangeTrackOrder,
            PlaylistOperation::DeleteTracks,
        ] {
            assert_ne!(op.ack_path(), op.reject_path());
        }
    }
}
