//! Shared test doubles for room, registry and API tests.
//!
//! - [`MockNotifier`] records every backend call and can be told to fail
//!   selected operations
//! - [`MockCatalog`] serves a fixed track table with optional per-track delays
//!   and counts fetches

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::api::{AppState, WsConnectionManager};
use crate::backend::{
    BackendNotifier, CatalogError, CatalogResult, Initiator, NotifierError, NotifierResult,
    PlaybackNotifier, PlaylistNotifier, PlaylistOperation, PlaylistUpdateAck,
    PlaylistUpdateRejection, TrackCatalog,
};
use crate::bootstrap::BootstrappedServices;
use crate::events::BroadcastEventBridge;
use crate::rooms::listening::ListeningRoomExposedState;
use crate::rooms::playlist::PlaylistExposedState;
use crate::rooms::RoomDeps;
use crate::runtime::TokioSpawner;
use crate::services::RoomRegistry;
use crate::state::Config;
use crate::track::{Track, TrackId};

pub(crate) fn track(id: &str, duration_ms: u64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist_name: "Artist".to_string(),
        duration_ms,
    }
}

pub(crate) fn ids(values: &[&str]) -> Vec<TrackId> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Builds room dependencies around the given mocks.
pub(crate) fn deps(notifier: &Arc<MockNotifier>, catalog: &Arc<MockCatalog>) -> RoomDeps {
    let notifier: Arc<dyn BackendNotifier> = notifier.clone();
    let catalog: Arc<dyn TrackCatalog> = catalog.clone();
    RoomDeps::new(notifier, catalog, TokioSpawner::current())
}

/// Wires the API state around the given mocks, with a live event bridge.
pub(crate) fn app_state(notifier: &Arc<MockNotifier>, catalog: &Arc<MockCatalog>) -> AppState {
    let event_bridge = Arc::new(BroadcastEventBridge::new(64));
    let deps = deps(notifier, catalog).with_emitter(event_bridge.clone());
    let services = BootstrappedServices {
        registry: Arc::new(RoomRegistry::new(deps)),
        notifier: notifier.clone(),
        event_bridge,
        ws_manager: Arc::new(WsConnectionManager::new()),
        spawner: TokioSpawner::current(),
        cancel_token: CancellationToken::new(),
    };
    AppState::new(&services, Arc::new(RwLock::new(Config::default())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifier
// ─────────────────────────────────────────────────────────────────────────────

/// A backend call observed by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NotifierCall {
    Ping,
    Play(String),
    Pause(String),
    RoomCreated(ListeningRoomExposedState),
    Joined {
        state: ListeningRoomExposedState,
        user_id: String,
    },
    PlaylistCreated(PlaylistExposedState),
    Accepted(PlaylistOperation, PlaylistUpdateAck),
    Rejected(PlaylistOperation, PlaylistUpdateRejection),
}

/// Operation names accepted by [`MockNotifier::fail`].
pub(crate) mod op {
    pub const PING: &str = "ping";
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const ROOM_CREATION: &str = "room_creation";
    pub const JOIN: &str = "join";
    pub const PLAYLIST_CREATION: &str = "playlist_creation";
    pub const ACK: &str = "ack";
    pub const REJECT: &str = "reject";
}

#[derive(Default)]
pub(crate) struct MockNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every later call of `operation` fail with a 500.
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().remove(operation);
    }

    /// Successful calls, in order.
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&NotifierCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn accepted(&self) -> Vec<PlaylistUpdateAck> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Accepted(_, ack) => Some(ack.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rejected(&self) -> Vec<(PlaylistOperation, PlaylistUpdateRejection)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Rejected(op, rejection) => Some((*op, rejection.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &'static str, call: NotifierCall) -> NotifierResult<()> {
        if self.failing.lock().contains(operation) {
            return Err(NotifierError::HttpStatus(500, format!("{} failed", operation)));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlaybackNotifier for MockNotifier {
    async fn ping(&self) -> NotifierResult<()> {
        self.record(op::PING, NotifierCall::Ping)
    }

    async fn play(&self, room_id: &str) -> NotifierResult<()> {
        self.record(op::PLAY, NotifierCall::Play(room_id.to_string()))
    }

    async fn pause(&self, room_id: &str) -> NotifierResult<()> {
        self.record(op::PAUSE, NotifierCall::Pause(room_id.to_string()))
    }

    async fn acknowledge_room_creation(
        &self,
        state: &ListeningRoomExposedState,
    ) -> NotifierResult<()> {
        self.record(op::ROOM_CREATION, NotifierCall::RoomCreated(state.clone()))
    }

    async fn acknowledge_join(
        &self,
        state: &ListeningRoomExposedState,
        joining_user_id: &str,
    ) -> NotifierResult<()> {
        self.record(
            op::JOIN,
            NotifierCall::Joined {
                state: state.clone(),
                user_id: joining_user_id.to_string(),
            },
        )
    }
}

#[async_trait]
impl PlaylistNotifier for MockNotifier {
    async fn acknowledge_playlist_creation(
        &self,
        state: &PlaylistExposedState,
    ) -> NotifierResult<()> {
        self.record(op::PLAYLIST_CREATION, NotifierCall::PlaylistCreated(state.clone()))
    }

    async fn acknowledge_update(
        &self,
        operation: PlaylistOperation,
        ack: &PlaylistUpdateAck,
    ) -> NotifierResult<()> {
        self.record(op::ACK, NotifierCall::Accepted(operation, ack.clone()))
    }

    async fn reject_update(
        &self,
        operation: PlaylistOperation,
        rejection: &PlaylistUpdateRejection,
    ) -> NotifierResult<()> {
        self.record(op::REJECT, NotifierCall::Rejected(operation, rejection.clone()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct MockCatalog {
    tracks: HashMap<TrackId, Track>,
    delays: Mutex<HashMap<TrackId, Duration>>,
    requests: Mutex<Vec<(Vec<TrackId>, Option<Initiator>)>>,
    fetches: AtomicUsize,
    failing: Mutex<bool>,
}

impl MockCatalog {
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Arc<Self> {
        Arc::new(Self {
            tracks: tracks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            ..Default::default()
        })
    }

    /// Delays every request containing `id` by `delay`.
    ///
    /// A request waits for the longest delay among its IDs.
    pub fn delay(&self, id: &str, delay: Duration) {
        self.delays.lock().insert(id.to_string(), delay);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Number of resolve calls received so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(Vec<TrackId>, Option<Initiator>)> {
        self.requests.lock().clone()
    }

    async fn lookup(&self, ids: &[TrackId], initiator: Option<&Initiator>) -> CatalogResult<Vec<Track>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push((ids.to_vec(), initiator.cloned()));

        let delay = {
            let delays = self.delays.lock();
            ids.iter().filter_map(|id| delays.get(id)).max().copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.lock() {
            return Err(CatalogError::HttpStatus(503, "catalog unavailable".into()));
        }
        ids.iter()
            .map(|id| {
                self.tracks
                    .get(id)
                    .cloned()
                    .ok_or_else(|| CatalogError::HttpStatus(404, format!("unknown track {}", id)))
            })
            .collect()
    }
}

#[async_trait]
impl TrackCatalog for MockCatalog {
    async fn resolve(&self, ids: &[TrackId]) -> CatalogResult<Vec<Track>> {
        self.lookup(ids, None).await
    }

    async fn resolve_for(
        &self,
        ids: &[TrackId],
        initiator: &Initiator,
    ) -> CatalogResult<Vec<Track>> {
        self.lookup(ids, Some(initiator)).await
    }
}
