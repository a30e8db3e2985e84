//! Track-addition merge engine.
//!
//! An add-tracks request goes through two deduplication passes:
//!
//! 1. [`admit`] runs when the signal is received and drops IDs already in the
//!    playlist. An empty result is rejected without any fetch.
//! 2. [`merge`] runs when the metadata fetch completes and filters again
//!    against the playlist as it is *then*. Faster requests may have added
//!    some of the same IDs in the meantime.
//!
//! Several requests can sit between the two passes at once. Their tracks are
//! appended in completion order, not issue order.

use crate::backend::Initiator;
use crate::track::{Track, TrackId};
use crate::utils::dedup_preserving_order;

use super::state::PlaylistState;

/// An add-tracks request waiting for its metadata fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    /// Per-room sequence number, for logs.
    pub id: u64,
    /// IDs that passed admission, in request order.
    pub candidate_ids: Vec<TrackId>,
    pub initiator: Initiator,
}

/// Result of the post-fetch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Tracks appended, in append order.
    Accepted(Vec<Track>),
    /// Every candidate was already present.
    Rejected,
}

/// Admission filter: requested IDs minus duplicates and IDs already present.
pub fn admit(requested: &[TrackId], state: &PlaylistState) -> Vec<TrackId> {
    dedup_preserving_order(requested.iter().cloned())
        .into_iter()
        .filter(|id| !state.contains(id))
        .collect()
}

/// Resolve-and-merge: appends the fetched candidates still missing from
/// `state`.
///
/// `fetched` is expected to be aligned with `request.candidate_ids`; tracks
/// that were not requested are ignored.
pub fn merge(state: &mut PlaylistState, request: &AddRequest, fetched: Vec<Track>) -> MergeOutcome {
    let surviving: Vec<Track> = fetched
        .into_iter()
        .filter(|t| request.candidate_ids.contains(&t.id))
        .collect();
    let appended = state.append_new(surviving);
    if appended.is_empty() {
        MergeOutcome::Rejected
    } else {
        MergeOutcome::Accepted(appended)
    }
}
