//! Trait abstractions for the rooms' external collaborators.
//!
//! These traits enable dependency injection for testability and modularity.
//! Rooms depend on traits rather than concrete HTTP implementations.
//!
//! Every operation must be idempotent: a room may attempt the same call more
//! than once after a restart.

use async_trait::async_trait;

use super::{
    CatalogResult, Initiator, NotifierResult, PlaylistOperation, PlaylistUpdateAck,
    PlaylistUpdateRejection,
};
use crate::rooms::listening::ListeningRoomExposedState;
use crate::rooms::playlist::PlaylistExposedState;
use crate::track::{Track, TrackId};

/// Notifications sent by listening rooms.
#[async_trait]
pub trait PlaybackNotifier: Send + Sync {
    /// Liveness probe of the backend.
    async fn ping(&self) -> NotifierResult<()>;

    /// The room entered the playing state.
    async fn play(&self, room_id: &str) -> NotifierResult<()>;

    /// The room entered the paused state.
    async fn pause(&self, room_id: &str) -> NotifierResult<()>;

    /// The room finished its creation sequence.
    ///
    /// # Arguments
    /// * `state` - Exposed state right after creation
    async fn acknowledge_room_creation(
        &self,
        state: &ListeningRoomExposedState,
    ) -> NotifierResult<()>;

    /// A user joined the room.
    ///
    /// # Arguments
    /// * `state` - Full exposed state, including the joining user
    /// * `joining_user_id` - The user who joined
    async fn acknowledge_join(
        &self,
        state: &ListeningRoomExposedState,
        joining_user_id: &str,
    ) -> NotifierResult<()>;
}

/// Notifications sent by playlist rooms.
#[async_trait]
pub trait PlaylistNotifier: Send + Sync {
    /// The playlist finished its creation sequence.
    async fn acknowledge_playlist_creation(&self, state: &PlaylistExposedState)
        -> NotifierResult<()>;

    /// A playlist edit was applied.
    async fn acknowledge_update(
        &self,
        operation: PlaylistOperation,
        ack: &PlaylistUpdateAck,
    ) -> NotifierResult<()>;

    /// A playlist edit was refused and nothing changed.
    async fn reject_update(
        &self,
        operation: PlaylistOperation,
        rejection: &PlaylistUpdateRejection,
    ) -> NotifierResult<()>;
}

/// Track metadata lookup.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Resolves metadata for `ids`.
    ///
    /// The result is aligned with the input: the n-th track describes the
    /// n-th requested ID.
    async fn resolve(&self, ids: &[TrackId]) -> CatalogResult<Vec<Track>>;

    /// Resolves metadata on behalf of a user, for attribution.
    ///
    /// Defaults to [`TrackCatalog::resolve`] for catalogs that do not track
    /// who asked.
    async fn resolve_for(
        &self,
        ids: &[TrackId],
        initiator: &Initiator,
    ) -> CatalogResult<Vec<Track>> {
        let _ = initiator;
        self.resolve(ids).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all backend notifications.
///
/// Used by the room registry to hand a single notifier to both room kinds.
#[async_trait]
pub trait BackendNotifier: PlaybackNotifier + PlaylistNotifier {}

/// Blanket implementation for any type implementing both traits.
impl<T: PlaybackNotifier + PlaylistNotifier> BackendNotifier for T {}
