//! Track metadata shared by both room kinds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier of a track in the external catalog.
pub type TrackId = String;

/// Metadata of a single track, as resolved by the catalog.
///
/// Immutable once fetched. Two tracks are the same track iff their IDs match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist_name: String,
    /// Track length in milliseconds.
    #[serde(rename = "durationMs", alias = "duration")]
    pub duration_ms: u64,
}

impl Track {
    /// Track length as a [`Duration`].
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Collects the IDs of a track sequence, preserving order.
pub fn track_ids<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Vec<TrackId> {
    tracks.into_iter().map(|t| t.id.clone()).collect()
}
