//! Playlist state and its exposed form.

use serde::{Deserialize, Serialize};

use crate::rooms::MoveDirection;
use crate::track::{Track, TrackId};

/// Parameters of a playlist creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistParams {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "creatorUserID")]
    pub creator_user_id: String,
    #[serde(rename = "initialTrackIDs", default)]
    pub initial_track_ids: Vec<TrackId>,
}

/// Authoritative state of a playlist.
///
/// Track IDs are unique. Tracks appear in the order their additions were
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistState {
    pub room_id: String,
    pub creator_user_id: String,
    tracks: Vec<Track>,
}

impl PlaylistState {
    /// `tracks` must be free of duplicate IDs.
    pub fn new(params: PlaylistParams, tracks: Vec<Track>) -> Self {
        Self {
            room_id: params.room_id,
            creator_user_id: params.creator_user_id,
            tracks,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == id)
    }

    /// Appends tracks whose IDs are not yet present, keeping their relative
    /// order. Returns the appended tracks.
    pub fn append_new(&mut self, candidates: Vec<Track>) -> Vec<Track> {
        let mut appended = Vec::with_capacity(candidates.len());
        for track in candidates {
            if !self.contains(&track.id) {
                self.tracks.push(track.clone());
                appended.push(track);
            }
        }
        appended
    }

    /// Moves the track at `from_index` one step in `direction`.
    ///
    /// Returns `false` and leaves the playlist untouched when `track_id` is
    /// not at `from_index` or the destination is out of bounds.
    pub fn move_track(&mut self, track_id: &str, from_index: usize, direction: MoveDirection) -> bool {
        let in_place = self
            .tracks
            .get(from_index)
            .is_some_and(|t| t.id == track_id);
        if !in_place {
            return false;
        }
        let to_index = match direction {
            MoveDirection::Up => from_index.checked_sub(1),
            MoveDirection::Down => Some(from_index + 1).filter(|i| *i < self.tracks.len()),
        };
        match to_index {
            Some(to_index) => {
                self.tracks.swap(from_index, to_index);
                true
            }
            None => false,
        }
    }

    /// Removes every listed track. Returns how many were removed.
    pub fn remove_tracks(&mut self, ids: &[TrackId]) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| !ids.contains(&t.id));
        before - self.tracks.len()
    }

    pub fn export(&self) -> PlaylistExposedState {
        PlaylistExposedState {
            room_id: self.room_id.clone(),
            creator_user_id: self.creator_user_id.clone(),
            tracks: self.tracks.clone(),
        }
    }
}

/// Query surface of a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistExposedState {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "creatorUserID")]
    pub creator_user_id: String,
    pub tracks: Vec<Track>,
}
