//! Playlist room actor.
//!
//! A playlist is edited concurrently by many users. Reordering and deletion
//! are applied synchronously inside the loop. Additions need a metadata
//! fetch, which runs as a separate task and reports back through a
//! completion channel; see [`merge`] for how concurrent additions are
//! reconciled.

pub mod merge;
pub mod state;

pub use merge::{AddRequest, MergeOutcome};
pub use state::{PlaylistExposedState, PlaylistParams, PlaylistState};

use std::sync::Arc;

use tokio::sync::mpsc;

use super::handle::Inbox;
use super::{MoveDirection, RoomDeps, RoomHandle, RoomKind, RoomSnapshot, Signal, SignalError};
use crate::backend::{
    CatalogResult, Initiator, PlaylistOperation, PlaylistUpdateAck, PlaylistUpdateRejection,
};
use crate::error::{RoomError, RoomResult};
use crate::events::RoomEvent;
use crate::runtime::TaskSpawner;
use crate::track::{track_ids, Track, TrackId};
use crate::utils::{dedup_preserving_order, now_millis};

struct FetchCompletion {
    request: AddRequest,
    result: CatalogResult<Vec<Track>>,
}

/// A running playlist. Only reachable through its [`RoomHandle`].
pub struct PlaylistRoom {
    state: PlaylistState,
    deps: RoomDeps,
    next_request_id: u64,
    in_flight: usize,
    completions: mpsc::UnboundedSender<FetchCompletion>,
}

impl PlaylistRoom {
    /// Fetches the initial tracks, acknowledges creation and starts the loop.
    ///
    /// A failed fetch or acknowledgement aborts creation.
    pub async fn spawn(
        params: PlaylistParams,
        deps: RoomDeps,
    ) -> RoomResult<(RoomHandle, PlaylistExposedState)> {
        let room_id = params.room_id.clone();
        let ids = dedup_preserving_order(params.initial_track_ids.iter().cloned());

        let tracks = deps.catalog.resolve(&ids).await.map_err(|e| {
            log::error!("[Playlist] {} initial track fetch failed: {}", room_id, e);
            RoomError::from(e)
        })?;
        let state = PlaylistState::new(params, tracks);
        let exposed = state.export();

        deps.notifier
            .acknowledge_playlist_creation(&exposed)
            .await
            .map_err(|e| {
                log::error!("[Playlist] {} creation acknowledgement failed: {}", room_id, e);
                RoomError::from(e)
            })?;

        let (handle, inbox) = deps.channels(&room_id, RoomKind::Playlist);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let room = Self {
            state,
            deps,
            next_request_id: 0,
            in_flight: 0,
            completions: completions_tx,
        };

        room.deps.emitter.emit_room(RoomEvent::Created {
            room_id: room_id.clone(),
            kind: RoomKind::Playlist,
            timestamp: now_millis(),
        });
        log::info!(
            "[Playlist] {} created with {} track(s)",
            room_id,
            exposed.tracks.len()
        );

        let spawner = room.deps.spawner.clone();
        spawner.spawn(room.run(inbox, completions_rx));
        Ok((handle, exposed))
    }

    fn room_id(&self) -> &str {
        &self.state.room_id
    }

    async fn run(
        mut self,
        mut inbox: Inbox,
        mut completions: mpsc::UnboundedReceiver<FetchCompletion>,
    ) {
        loop {
            tokio::select! {
                biased;

                signal = inbox.signals.recv() => match signal {
                    Some(Signal::Terminate) => {
                        log::info!("[Playlist] {} terminating on request", self.room_id());
                        break;
                    }
                    Some(signal) => self.handle_signal(signal).await,
                    None => break,
                },
                Some(completion) = completions.recv() => self.handle_fetch_completion(completion).await,
                Some(reply) = inbox.queries.recv() => {
                    let _ = reply.send(RoomSnapshot::Playlist(self.state.export()));
                }
            }
        }

        if self.in_flight > 0 {
            log::info!(
                "[Playlist] {} dropping {} in-flight addition(s)",
                self.room_id(),
                self.in_flight
            );
        }
        log::info!("[Playlist] {} stopped", self.room_id());
        self.deps.emitter.emit_room(RoomEvent::Terminated {
            room_id: self.state.room_id.clone(),
            timestamp: now_millis(),
        });
    }

    async fn handle_signal(&mut self, signal: Signal) {
        let route = signal.route();
        let result = match signal {
            Signal::AddTracks {
                track_ids,
                user_id,
                device_id,
            } => {
                self.add_tracks(track_ids, Initiator::new(user_id, device_id))
                    .await
            }
            Signal::ChangeTrackOrder {
                track_id,
                from_index,
                operation_to_apply,
                user_id,
                device_id,
            } => {
                self.change_track_order(
                    &track_id,
                    from_index,
                    operation_to_apply,
                    Initiator::new(user_id, device_id),
                )
                .await
            }
            Signal::DeleteTracks {
                track_ids,
                user_id,
                device_id,
            } => {
                self.delete_tracks(&track_ids, Initiator::new(user_id, device_id))
                    .await
            }
            other => Err(SignalError::Unroutable {
                route: other.route().to_string(),
                kind: RoomKind::Playlist.as_str(),
            }
            .into()),
        };
        if let Err(e) = result {
            log::warn!("[Playlist] {} {} aborted: {}", self.room_id(), route, e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Additions
    // ─────────────────────────────────────────────────────────────────────────

    async fn add_tracks(&mut self, requested: Vec<TrackId>, initiator: Initiator) -> RoomResult<()> {
        let candidate_ids = merge::admit(&requested, &self.state);
        if candidate_ids.is_empty() {
            log::debug!(
                "[Playlist] {} nothing new in {:?} from {}",
                self.room_id(),
                requested,
                initiator.user_id
            );
            return self.reject(PlaylistOperation::AddTracks, initiator).await;
        }

        self.next_request_id += 1;
        let request = AddRequest {
            id: self.next_request_id,
            candidate_ids,
            initiator,
        };
        log::debug!(
            "[Playlist] {} request #{} fetching {:?}",
            self.room_id(),
            request.id,
            request.candidate_ids
        );

        self.in_flight += 1;
        let catalog = Arc::clone(&self.deps.catalog);
        let completions = self.completions.clone();
        self.deps.spawner.spawn(async move {
            let result = catalog
                .resolve_for(&request.candidate_ids, &request.initiator)
                .await;
            let _ = completions.send(FetchCompletion { request, result });
        });
        Ok(())
    }

    async fn handle_fetch_completion(&mut self, completion: FetchCompletion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let FetchCompletion { request, result } = completion;

        let outcome = match result {
            Ok(tracks) => self.merge_fetched(&request, tracks).await,
            Err(e) => {
                log::warn!(
                    "[Playlist] {} request #{} fetch failed: {}",
                    self.room_id(),
                    request.id,
                    e
                );
                self.reject(PlaylistOperation::AddTracks, request.initiator.clone())
                    .await
            }
        };
        if let Err(e) = outcome {
            log::warn!(
                "[Playlist] {} request #{} aborted: {}",
                self.room_id(),
                request.id,
                e
            );
        }
    }

    async fn merge_fetched(&mut self, request: &AddRequest, tracks: Vec<Track>) -> RoomResult<()> {
        let mut tentative = self.state.clone();
        match merge::merge(&mut tentative, request, tracks) {
            MergeOutcome::Rejected => {
                log::debug!(
                    "[Playlist] {} request #{} subsumed by earlier additions",
                    self.room_id(),
                    request.id
                );
                self.reject(PlaylistOperation::AddTracks, request.initiator.clone())
                    .await
            }
            MergeOutcome::Accepted(appended) => {
                let added_ids = track_ids(&appended);
                self.commit(
                    PlaylistOperation::AddTracks,
                    request.initiator.clone(),
                    tentative,
                    appended,
                )
                .await?;
                log::info!(
                    "[Playlist] {} request #{} appended {:?}",
                    self.room_id(),
                    request.id,
                    added_ids
                );
                self.deps.emitter.emit_room(RoomEvent::TracksAdded {
                    room_id: self.state.room_id.clone(),
                    user_id: request.initiator.user_id.clone(),
                    track_ids: added_ids,
                    timestamp: now_millis(),
                });
                Ok(())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reordering and deletion
    // ─────────────────────────────────────────────────────────────────────────

    async fn change_track_order(
        &mut self,
        track_id: &str,
        from_index: usize,
        direction: MoveDirection,
        initiator: Initiator,
    ) -> RoomResult<()> {
        let mut tentative = self.state.clone();
        if !tentative.move_track(track_id, from_index, direction) {
            log::debug!(
                "[Playlist] {} cannot move {} from {} {:?}",
                self.room_id(),
                track_id,
                from_index,
                direction
            );
            return self
                .reject(PlaylistOperation::ChangeTrackOrder, initiator)
                .await;
        }
        self.commit(PlaylistOperation::ChangeTrackOrder, initiator, tentative, Vec::new())
            .await?;
        self.emit_updated(PlaylistOperation::ChangeTrackOrder);
        Ok(())
    }

    async fn delete_tracks(&mut self, ids: &[TrackId], initiator: Initiator) -> RoomResult<()> {
        let mut tentative = self.state.clone();
        if tentative.remove_tracks(ids) == 0 {
            return self.reject(PlaylistOperation::DeleteTracks, initiator).await;
        }
        self.commit(PlaylistOperation::DeleteTracks, initiator, tentative, Vec::new())
            .await?;
        self.emit_updated(PlaylistOperation::DeleteTracks);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Acknowledges an edit and keeps `tentative` once the backend accepted it.
    async fn commit(
        &mut self,
        operation: PlaylistOperation,
        initiator: Initiator,
        tentative: PlaylistState,
        accepted_tracks: Vec<Track>,
    ) -> RoomResult<()> {
        let ack = PlaylistUpdateAck {
            room_id: self.state.room_id.clone(),
            initiator,
            accepted_tracks,
            state: tentative.export(),
        };
        self.deps
            .notifier
            .acknowledge_update(operation, &ack)
            .await?;
        self.state = tentative;
        Ok(())
    }

    async fn reject(&self, operation: PlaylistOperation, initiator: Initiator) -> RoomResult<()> {
        let rejection = PlaylistUpdateRejection {
            room_id: self.state.room_id.clone(),
            initiator,
        };
        self.deps
            .emitter
            .emit_room(RoomEvent::TracksRejected {
                room_id: self.state.room_id.clone(),
                user_id: rejection.initiator.user_id.clone(),
                operation,
                timestamp: now_millis(),
            });
        self.deps
            .notifier
            .reject_update(operation, &rejection)
            .await
            .map_err(RoomError::from)
    }

    fn emit_updated(&self, operation: PlaylistOperation) {
        self.deps.emitter.emit_room(RoomEvent::PlaylistUpdated {
            room_id: self.state.room_id.clone(),
            operation,
            track_count: self.state.tracks().len(),
            timestamp: now_millis(),
        });
    }
}
