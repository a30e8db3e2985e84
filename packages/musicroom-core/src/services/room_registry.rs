//! Registry of live rooms.
//!
//! The registry is the only place rooms are created, and it guarantees at
//! most one live loop per room ID. An ID is reserved while its room is being
//! constructed, so two concurrent creations cannot both succeed.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::{RoomError, RoomResult};
use crate::rooms::listening::{ListeningRoom, ListeningRoomExposedState, ListeningRoomParams};
use crate::rooms::playlist::{PlaylistExposedState, PlaylistParams, PlaylistRoom};
use crate::rooms::{RoomDeps, RoomHandle, RoomKind, RoomSnapshot, Signal};
use crate::services::CheckpointStore;
use crate::timer::TimerState;

enum RoomSlot {
    /// Creation sequence running; the ID is taken.
    Creating(RoomKind),
    Live(RoomHandle),
}

/// Summary of a room, as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub kind: RoomKind,
    /// Latest checkpoint of the room's track timer, if one ever ran.
    #[serde(rename = "lastCheckpoint", skip_serializing_if = "Option::is_none")]
    pub last_checkpoint: Option<TimerState>,
}

/// Releases a reserved ID unless the room was committed.
struct Reservation<'a> {
    rooms: &'a DashMap<String, RoomSlot>,
    room_id: String,
    armed: bool,
}

impl Reservation<'_> {
    fn commit(mut self, handle: RoomHandle) {
        self.rooms
            .insert(self.room_id.clone(), RoomSlot::Live(handle));
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.rooms
                .remove_if(&self.room_id, |_, slot| matches!(slot, RoomSlot::Creating(_)));
        }
    }
}

/// Owns the handles of every live room.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomSlot>,
    deps: RoomDeps,
    checkpoints: Arc<CheckpointStore>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    ///
    /// Timer checkpoints of every room are routed to the registry's
    /// [`CheckpointStore`], replacing any heartbeat set on `deps`.
    pub fn new(deps: RoomDeps) -> Self {
        let checkpoints = Arc::new(CheckpointStore::new());
        let deps = deps.with_heartbeat(checkpoints.clone());
        Self {
            rooms: DashMap::new(),
            deps,
            checkpoints,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a listening room and returns its initial exposed state.
    pub async fn create_listening_room(
        &self,
        params: ListeningRoomParams,
    ) -> RoomResult<ListeningRoomExposedState> {
        let reservation = self.reserve(&params.room_id, RoomKind::Listening)?;
        let (handle, exposed) = ListeningRoom::spawn(params, self.deps.clone()).await?;
        reservation.commit(handle);
        Ok(exposed)
    }

    /// Creates a playlist and returns its initial exposed state.
    pub async fn create_playlist_room(
        &self,
        params: PlaylistParams,
    ) -> RoomResult<PlaylistExposedState> {
        let reservation = self.reserve(&params.room_id, RoomKind::Playlist)?;
        let (handle, exposed) = PlaylistRoom::spawn(params, self.deps.clone()).await?;
        reservation.commit(handle);
        Ok(exposed)
    }

    fn reserve(&self, room_id: &str, kind: RoomKind) -> RoomResult<Reservation<'_>> {
        if room_id.trim().is_empty() {
            return Err(RoomError::InvalidRequest("roomID must not be empty".into()));
        }
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(mut slot) => {
                let holder = match slot.get() {
                    RoomSlot::Live(handle) if handle.is_closed() => None,
                    RoomSlot::Live(handle) => Some(handle.kind()),
                    RoomSlot::Creating(pending) => Some(*pending),
                };
                if let Some(holder) = holder {
                    log::warn!(
                        "[Registry] Refusing {} room {}: ID held by a {} room",
                        kind.as_str(),
                        room_id,
                        holder.as_str()
                    );
                    return Err(RoomError::RoomAlreadyExists {
                        room_id: room_id.to_string(),
                        kind: holder,
                    });
                }
                slot.insert(RoomSlot::Creating(kind));
            }
            Entry::Vacant(slot) => {
                slot.insert(RoomSlot::Creating(kind));
            }
        }
        Ok(Reservation {
            rooms: &self.rooms,
            room_id: room_id.to_string(),
            armed: true,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signals and queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Parses a raw route-tagged signal and delivers it.
    ///
    /// Malformed payloads and routes the room does not handle are logged and
    /// refused without reaching the room.
    pub async fn signal(&self, room_id: &str, raw: serde_json::Value) -> RoomResult<()> {
        let signal = Signal::from_value(raw).map_err(|e| {
            log::warn!("[Registry] Dropping malformed signal for {}: {}", room_id, e);
            RoomError::from(e)
        })?;
        self.send(room_id, signal).await
    }

    /// Delivers a parsed signal.
    pub async fn send(&self, room_id: &str, signal: Signal) -> RoomResult<()> {
        let handle = self.live_handle(room_id)?;
        signal.ensure_routable(handle.kind()).map_err(|e| {
            log::warn!("[Registry] Dropping signal for {}: {}", room_id, e);
            RoomError::from(e)
        })?;
        let result = handle.send(signal).await;
        if result.is_err() {
            self.prune(room_id);
        }
        result
    }

    /// Returns a snapshot of the room's exposed state.
    pub async fn query(&self, room_id: &str) -> RoomResult<RoomSnapshot> {
        let handle = self.live_handle(room_id)?;
        let result = handle.query().await;
        if result.is_err() {
            self.prune(room_id);
        }
        result
    }

    /// Summaries of all live rooms, sorted by ID.
    pub fn list(&self) -> Vec<RoomSummary> {
        self.prune_closed();
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .filter_map(|entry| match entry.value() {
                RoomSlot::Live(handle) => Some(RoomSummary {
                    room_id: entry.key().clone(),
                    kind: handle.kind(),
                    last_checkpoint: self.checkpoints.latest(entry.key()),
                }),
                RoomSlot::Creating(_) => None,
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    /// Fails with `RoomNotFound` unless the room is live.
    pub fn ensure_live(&self, room_id: &str) -> RoomResult<()> {
        self.live_handle(room_id).map(drop)
    }

    /// Latest timer checkpoint of a listening room.
    pub fn last_checkpoint(&self, room_id: &str) -> Option<TimerState> {
        self.checkpoints.latest(room_id)
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.prune_closed();
        self.rooms
            .iter()
            .filter(|entry| matches!(entry.value(), RoomSlot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Terminates every live room and waits for their loops to stop.
    pub async fn terminate_all(&self) {
        let handles: Vec<RoomHandle> = self
            .rooms
            .iter()
            .filter_map(|entry| match entry.value() {
                RoomSlot::Live(handle) => Some(handle.clone()),
                RoomSlot::Creating(_) => None,
            })
            .collect();

        log::info!("[Registry] Terminating {} room(s)", handles.len());
        for handle in &handles {
            // A closed room already stopped; nothing to do.
            let _ = handle.send(Signal::Terminate).await;
        }
        futures::future::join_all(handles.iter().map(|handle| handle.closed())).await;
        self.prune_closed();
    }

    fn live_handle(&self, room_id: &str) -> RoomResult<RoomHandle> {
        let handle = match self.rooms.get(room_id).as_deref() {
            Some(RoomSlot::Live(handle)) => handle.clone(),
            _ => return Err(RoomError::RoomNotFound(room_id.to_string())),
        };
        if handle.is_closed() {
            self.prune(room_id);
            return Err(RoomError::RoomNotFound(room_id.to_string()));
        }
        Ok(handle)
    }

    fn prune(&self, room_id: &str) {
        let removed = self
            .rooms
            .remove_if(room_id, |_, slot| {
                matches!(slot, RoomSlot::Live(handle) if handle.is_closed())
            })
            .is_some();
        if removed {
            self.checkpoints.forget(room_id);
            log::debug!("[Registry] Pruned stopped room {}", room_id);
        }
    }

    fn prune_closed(&self) {
        let stopped: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| matches!(entry.value(), RoomSlot::Live(handle) if handle.is_closed()))
            .map(|entry| entry.key().clone())
            .collect();
        for room_id in stopped {
            self.prune(&room_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::test_fixtures::{deps, ids, op, track, MockCatalog, MockNotifier};
    use serde_json::json;

    fn registry() -> (RoomRegistry, Arc<MockNotifier>, Arc<MockCatalog>) {
        let notifier = MockNotifier::new();
        let catalog = MockCatalog::with_tracks([track("a", 10_000), track("b", 10_000)]);
        let registry = RoomRegistry::new(deps(&notifier, &catalog));
        (registry, notifier, catalog)
    }

    fn listening(room_id: &str) -> ListeningRoomParams {
        ListeningRoomParams {
            room_id: room_id.into(),
            creator_user_id: "creator".into(),
            room_name: "Room".into(),
            initial_track_ids: ids(&["a", "b"]),
        }
    }

    fn playlist(room_id: &str) -> PlaylistParams {
        PlaylistParams {
            room_id: room_id.into(),
            creator_user_id: "creator".into(),
            initial_track_ids: ids(&["a"]),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn room_ids_are_exclusive() {
        let (registry, _, catalog) = registry();
        catalog.delay("a", Duration::from_millis(100));

        let (first, second) = tokio::join!(
            registry.create_listening_room(listening("r1")),
            registry.create_playlist_room(playlist("r1")),
        );

        assert!(first.is_ok());
        // The listening room still held the ID while it was being created.
        assert!(matches!(
            second,
            Err(RoomError::RoomAlreadyExists {
                kind: RoomKind::Listening,
                ..
            })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_creation_releases_id() {
        let (registry, notifier, _) = registry();
        notifier.fail(op::ROOM_CREATION);
        assert!(registry.create_listening_room(listening("r1")).await.is_err());

        notifier.recover(op::ROOM_CREATION);
        assert!(registry.create_listening_room(listening("r1")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_id_is_refused() {
        let (registry, _, _) = registry();
        let err = registry
            .create_listening_room(listening(" "))
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::InvalidRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn raw_signals_are_parsed_and_routed() {
        let (registry, _, _) = registry();
        registry
            .create_listening_room(listening("r1"))
            .await
            .unwrap();

        registry
            .signal("r1", json!({"route": "JOIN", "userID": "guest"}))
            .await
            .unwrap();
        match registry.query("r1").await.unwrap() {
            RoomSnapshot::Listening(state) => assert_eq!(state.users.len(), 2),
            other => panic!("unexpected snapshot: {:?}", other),
        }

        let malformed = registry.signal("r1", json!({"route": "JOIN"})).await;
        assert!(matches!(malformed, Err(RoomError::InvalidSignal(_))));

        let unroutable = registry
            .signal(
                "r1",
                json!({"route": "DELETE_TRACKS", "trackIDs": [], "userID": "u", "deviceID": "d"}),
            )
            .await;
        assert!(matches!(unroutable, Err(RoomError::InvalidSignal(_))));

        let missing = registry.signal("nope", json!({"route": "PLAY"})).await;
        assert!(matches!(missing, Err(RoomError::RoomNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_room_is_pruned_and_id_reusable() {
        let (registry, _, _) = registry();
        registry.create_playlist_room(playlist("p1")).await.unwrap();

        registry
            .signal("p1", json!({"route": "TERMINATE"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.list().is_empty());
        assert!(matches!(
            registry.query("p1").await,
            Err(RoomError::RoomNotFound(_))
        ));
        assert!(registry.create_playlist_room(playlist("p1")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_checkpoints_are_tracked() {
        let (registry, _, _) = registry();
        registry
            .create_listening_room(listening("r1"))
            .await
            .unwrap();

        registry.send("r1", Signal::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4_500)).await;

        let checkpoint = registry.last_checkpoint("r1").unwrap();
        assert!((4_000..=4_001).contains(&checkpoint.elapsed_ms));
        let summary = registry.list();
        assert_eq!(summary[0].last_checkpoint, Some(checkpoint));
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_all_stops_every_room() {
        let (registry, _, _) = registry();
        registry
            .create_listening_room(listening("r1"))
            .await
            .unwrap();
        registry.create_playlist_room(playlist("p1")).await.unwrap();
        registry.send("r1", Signal::Play).await.unwrap();

        registry.terminate_all().await;

        assert!(registry.is_empty());
        assert!(registry.last_checkpoint("r1").is_none());
    }
}
