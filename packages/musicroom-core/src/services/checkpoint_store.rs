//! Latest timer checkpoint per room.

use dashmap::DashMap;

use crate::timer::{TimerHeartbeat, TimerState};

/// Keeps the most recent liveness checkpoint of every running track timer.
///
/// The stored progress is what a restarted timer would resume from; the
/// registry reports it in room summaries.
#[derive(Default)]
pub struct CheckpointStore {
    checkpoints: DashMap<String, TimerState>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest checkpoint of `room_id`, if its timer ever reported one.
    pub fn latest(&self, room_id: &str) -> Option<TimerState> {
        self.checkpoints.get(room_id).map(|entry| *entry)
    }

    /// Forgets the checkpoint of a room that stopped.
    pub fn forget(&self, room_id: &str) {
        self.checkpoints.remove(room_id);
    }
}

impl TimerHeartbeat for CheckpointStore {
    fn beat(&self, room_id: &str, progress: &TimerState) {
        log::trace!(
            "[Timer] {} checkpoint {}/{}ms",
            room_id,
            progress.elapsed_ms,
            progress.total_duration_ms
        );
        self.checkpoints.insert(room_id.to_string(), *progress);
    }
}
