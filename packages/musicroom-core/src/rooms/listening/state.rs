//! Listening room state and its exposed form.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::timer::{TimerPhase, TimerState};
use crate::track::{track_ids, Track, TrackId};

/// Parameters of a listening room creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningRoomParams {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "creatorUserID")]
    pub creator_user_id: String,
    #[serde(rename = "roomName")]
    pub room_name: String,
    #[serde(rename = "initialTrackIDs")]
    pub initial_track_ids: Vec<TrackId>,
}

/// Authoritative state of a listening room.
///
/// `playing` is not stored here: it is derived from the playback machine's
/// active state whenever the room is exported.
#[derive(Debug, Clone, PartialEq)]
pub struct ListeningRoomState {
    pub room_id: String,
    pub creator_user_id: String,
    pub room_name: String,
    users: Vec<String>,
    current_track: Option<Track>,
    pending_queue: VecDeque<Track>,
    timer: TimerState,
}

impl ListeningRoomState {
    /// Builds the state of a freshly created room.
    ///
    /// `tracks` must be free of duplicate IDs. The creator is the first
    /// member. No track is current until [`advance_queue`](Self::advance_queue)
    /// is called.
    pub fn new(params: ListeningRoomParams, tracks: Vec<Track>) -> Self {
        Self {
            users: vec![params.creator_user_id.clone()],
            room_id: params.room_id,
            creator_user_id: params.creator_user_id,
            room_name: params.room_name,
            current_track: None,
            pending_queue: tracks.into(),
            timer: TimerState::idle(0),
        }
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn pending_queue(&self) -> impl Iterator<Item = &Track> {
        self.pending_queue.iter()
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    /// Adds a member. Returns `false` if the user was already present.
    pub fn add_user(&mut self, user_id: &str) -> bool {
        if self.users.iter().any(|u| u == user_id) {
            return false;
        }
        self.users.push(user_id.to_string());
        true
    }

    /// Pops the head of the queue into the current track and resets the timer.
    ///
    /// Returns the new current track. With an empty queue nothing changes and
    /// `None` is returned: a finished track stays current.
    pub fn advance_queue(&mut self) -> Option<&Track> {
        let next = self.pending_queue.pop_front()?;
        self.timer = TimerState::idle(next.duration_ms);
        self.current_track = Some(next);
        self.current_track.as_ref()
    }

    /// Whether `PLAY` has anything left to play.
    pub fn has_playable_track(&self) -> bool {
        self.current_track.is_some() && self.timer.phase != TimerPhase::Finished
    }

    /// Stores a timer snapshot reported for the current track.
    ///
    /// Progress never moves backwards and never passes the track's duration,
    /// so a late or out-of-date snapshot cannot undo played time.
    pub fn store_timer(&mut self, snapshot: TimerState) {
        if snapshot.total_duration_ms != self.timer.total_duration_ms {
            log::warn!(
                "[Room] {} ignoring timer snapshot for a {}ms track (current is {}ms)",
                self.room_id,
                snapshot.total_duration_ms,
                self.timer.total_duration_ms
            );
            return;
        }
        let elapsed_ms = snapshot
            .elapsed_ms
            .max(self.timer.elapsed_ms)
            .min(self.timer.total_duration_ms);
        self.timer = TimerState {
            phase: snapshot.phase,
            elapsed_ms,
            total_duration_ms: self.timer.total_duration_ms,
        };
    }

    /// Exposed form of the state, as seen by queries and the backend.
    pub fn export(&self, playing: bool) -> ListeningRoomExposedState {
        ListeningRoomExposedState {
            room_id: self.room_id.clone(),
            creator_user_id: self.creator_user_id.clone(),
            room_name: self.room_name.clone(),
            playing,
            users: self.users.clone(),
            pending_queue_ids: track_ids(&self.pending_queue),
            current_track: self.current_track.clone(),
            pending_queue: self.pending_queue.iter().cloned().collect(),
            timer: self.timer,
        }
    }
}

/// Query surface of a listening room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningRoomExposedState {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "creatorUserID")]
    pub creator_user_id: String,
    #[serde(rename = "roomName")]
    pub room_name: String,
    pub playing: bool,
    pub users: Vec<String>,
    #[serde(rename = "pendingQueueIDs")]
    pub pending_queue_ids: Vec<TrackId>,
    #[serde(rename = "currentTrack")]
    pub current_track: Option<Track>,
    #[serde(rename = "pendingQueue")]
    pub pending_queue: Vec<Track>,
    pub timer: TimerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, duration_ms: u64) -> Track {
        Track {
            id: id.into(),
            title: format!("Title {}", id),
            artist_name: "Artist".into(),
            duration_ms,
        }
    }

    fn state_with(tracks: Vec<Track>) -> ListeningRoomState {
        ListeningRoomState::new(
            ListeningRoomParams {
                room_id: "room".into(),
                creator_user_id: "creator".into(),
                room_name: "Room".into(),
                initial_track_ids: track_ids(&tracks),
            },
            tracks,
        )
    }

    #[test]
    fn advance_moves_head_out_of_queue() {
        let mut state = state_with(vec![track("a", 1000), track("b", 2000)]);
        state.advance_queue();

        let exposed = state.export(false);
        assert_eq!(exposed.current_track.unwrap().id, "a");
        assert_eq!(exposed.pending_queue_ids, vec!["b".to_string()]);
        assert_eq!(exposed.timer, TimerState::idle(1000));
    }

    #[test]
    fn advance_on_empty_queue_keeps_finished_track() {
        let mut state = state_with(vec![track("a", 1000)]);
        state.advance_queue();
        state.store_timer(TimerState::idle(1000).finished());

        assert!(state.advance_queue().is_none());
        assert_eq!(state.current_track().unwrap().id, "a");
        assert_eq!(state.timer().phase, TimerPhase::Finished);
        assert!(!state.has_playable_track());
    }

    #[test]
    fn empty_room_has_nothing_to_play() {
        let mut state = state_with(vec![]);
        assert!(state.advance_queue().is_none());
        assert!(state.current_track().is_none());
        assert!(!state.has_playable_track());
    }

    #[test]
    fn queue_never_contains_current_track() {
        let mut state = state_with(vec![track("a", 1), track("b", 1), track("c", 1)]);
        while let Some(current) = state.advance_queue().cloned() {
            assert!(state.pending_queue().all(|t| t.id != current.id));
        }
    }

    #[test]
    fn users_are_an_ordered_set() {
        let mut state = state_with(vec![]);
        assert!(state.add_user("u1"));
        assert!(!state.add_user("creator"));
        assert!(!state.add_user("u1"));
        assert_eq!(state.users(), ["creator", "u1"]);
    }

    #[test]
    fn stored_timer_never_moves_backwards() {
        let mut state = state_with(vec![track("a", 10_000)]);
        state.advance_queue();

        state.store_timer(TimerState {
            phase: TimerPhase::Pending,
            elapsed_ms: 4_000,
            total_duration_ms: 10_000,
        });
        state.store_timer(TimerState {
            phase: TimerPhase::Pending,
            elapsed_ms: 3_000,
            total_duration_ms: 10_000,
        });
        assert_eq!(state.timer().elapsed_ms, 4_000);

        state.store_timer(TimerState {
            phase: TimerPhase::Pending,
            elapsed_ms: 60_000,
            total_duration_ms: 10_000,
        });
        assert_eq!(state.timer().elapsed_ms, 10_000);
    }

    #[test]
    fn exposed_state_uses_wire_names() {
        let mut state = state_with(vec![track("a", 1000)]);
        state.advance_queue();
        let json = serde_json::to_value(state.export(true)).unwrap();
        assert_eq!(json["roomID"], "room");
        assert_eq!(json["creatorUserID"], "creator");
        assert_eq!(json["playing"], true);
        assert_eq!(json["currentTrack"]["id"], "a");
        assert_eq!(json["pendingQueueIDs"], serde_json::json!([]));
        assert_eq!(json["timer"]["phase"], "idle");
    }
}
