//! Listening room actor.
//!
//! A listening room plays a shared queue. Its loop owns the
//! [`ListeningRoomState`] and a [`PlaybackMachine`], and multiplexes three
//! sources:
//!
//! 1. external signals (`PLAY`, `PAUSE`, `JOIN`, `TERMINATE`)
//! 2. reports from the track timer task
//! 3. state queries
//!
//! Machine effects are applied in order, and raised events are drained before
//! the loop goes back to waiting, so a query never observes a transient state
//! such as `LaunchingTimer`.

pub mod machine;
pub mod state;

pub use machine::{Effect, PlaybackEvent, PlaybackMachine, PlaybackState, PlayingPhase};
pub use state::{ListeningRoomExposedState, ListeningRoomParams, ListeningRoomState};

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handle::Inbox;
use super::{RoomDeps, RoomHandle, RoomKind, RoomSnapshot, Signal, SignalError};
use crate::error::{RoomError, RoomResult};
use crate::events::RoomEvent;
use crate::runtime::TaskSpawner;
use crate::timer::{run_track_timer, TimerPhase, TimerState};
use crate::utils::{dedup_preserving_order, now_millis};

/// Final report of a track timer task.
///
/// `outcome` is `None` when the task panicked.
struct TimerReport {
    generation: u64,
    outcome: Option<TimerState>,
}

struct ActiveTimer {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Option<TimerState>>,
}

/// A running listening room. Only reachable through its [`RoomHandle`].
pub struct ListeningRoom {
    state: ListeningRoomState,
    machine: PlaybackMachine,
    deps: RoomDeps,
    active_timer: Option<ActiveTimer>,
    timer_generation: u64,
    timer_reports: mpsc::UnboundedSender<TimerReport>,
}

impl ListeningRoom {
    /// Runs the creation sequence and starts the room loop.
    ///
    /// The initial tracks are fetched in full and the backend is told about
    /// the new room, with every track still queued, before the head of the
    /// queue becomes current and the room enters `Paused`. A failed fetch or
    /// creation acknowledgement aborts creation and no loop is started.
    ///
    /// Returns the handle to the running room and its initial exposed state.
    pub async fn spawn(
        params: ListeningRoomParams,
        deps: RoomDeps,
    ) -> RoomResult<(RoomHandle, ListeningRoomExposedState)> {
        let room_id = params.room_id.clone();
        let track_ids = dedup_preserving_order(params.initial_track_ids.iter().cloned());

        let tracks = deps.catalog.resolve(&track_ids).await.map_err(|e| {
            log::error!("[Room] {} initial track fetch failed: {}", room_id, e);
            RoomError::from(e)
        })?;

        let mut state = ListeningRoomState::new(params, tracks);
        deps.notifier
            .acknowledge_room_creation(&state.export(false))
            .await
            .map_err(|e| {
                log::error!("[Room] {} creation acknowledgement failed: {}", room_id, e);
                RoomError::from(e)
            })?;

        state.advance_queue();
        let exposed = state.export(false);

        let (handle, inbox) = deps.channels(&room_id, RoomKind::Listening);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let mut room = Self {
            state,
            machine: PlaybackMachine::new(),
            deps,
            active_timer: None,
            timer_generation: 0,
            timer_reports: reports_tx,
        };

        let mut machine = PlaybackMachine::new();
        let entry = machine.start();
        if let Err(e) = room.settle(machine, entry).await {
            log::warn!("[Room] {} initial pause notification failed: {}", room_id, e);
        }

        room.deps.emitter.emit_room(RoomEvent::Created {
            room_id: room_id.clone(),
            kind: RoomKind::Listening,
            timestamp: now_millis(),
        });
        log::info!(
            "[Room] {} created with {} track(s)",
            room_id,
            exposed.pending_queue.len() + usize::from(exposed.current_track.is_some())
        );

        let spawner = room.deps.spawner.clone();
        spawner.spawn(room.run(inbox, reports_rx));
        Ok((handle, exposed))
    }

    fn room_id(&self) -> &str {
        &self.state.room_id
    }

    fn export(&self) -> ListeningRoomExposedState {
        self.state.export(self.machine.state().is_playing())
    }

    async fn run(mut self, mut inbox: Inbox, mut reports: mpsc::UnboundedReceiver<TimerReport>) {
        loop {
            tokio::select! {
                biased;

                signal = inbox.signals.recv() => match signal {
                    Some(Signal::Terminate) => {
                        log::info!("[Room] {} terminating on request", self.room_id());
                        break;
                    }
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        log::debug!("[Room] {} all handles dropped", self.room_id());
                        break;
                    }
                },
                Some(report) = reports.recv() => self.handle_timer_report(report).await,
                Some(reply) = inbox.queries.recv() => {
                    let _ = reply.send(RoomSnapshot::Listening(self.export()));
                }
            }
        }
        self.shutdown().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signals
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_signal(&mut self, signal: Signal) {
        let route = signal.route();
        let result = match signal {
            Signal::Play => self.play().await,
            Signal::Pause => self.dispatch(PlaybackEvent::Pause).await,
            Signal::Join { user_id } => self.join(user_id).await,
            other => Err(SignalError::Unroutable {
                route: other.route().to_string(),
                kind: RoomKind::Listening.as_str(),
            }
            .into()),
        };
        if let Err(e) = result {
            log::warn!("[Room] {} {} aborted: {}", self.room_id(), route, e);
        }
    }

    async fn play(&mut self) -> RoomResult<()> {
        if !self.state.has_playable_track() {
            log::info!("[Room] {} has nothing to play", self.room_id());
            return Ok(());
        }
        self.dispatch(PlaybackEvent::Play).await
    }

    /// Adds the user and acknowledges the join.
    ///
    /// The new member is only kept if the backend accepted the notification.
    async fn join(&mut self, user_id: String) -> RoomResult<()> {
        let mut tentative = self.state.clone();
        let added = tentative.add_user(&user_id);
        let exposed = tentative.export(self.machine.state().is_playing());

        self.deps
            .notifier
            .acknowledge_join(&exposed, &user_id)
            .await?;

        self.state = tentative;
        if added {
            log::info!("[Room] {} joined by {}", self.room_id(), user_id);
            self.deps.emitter.emit_room(RoomEvent::UserJoined {
                room_id: self.state.room_id.clone(),
                user_id,
                timestamp: now_millis(),
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Machine
    // ─────────────────────────────────────────────────────────────────────────

    async fn dispatch(&mut self, event: PlaybackEvent) -> RoomResult<()> {
        let mut machine = self.machine.clone();
        let effects = machine.send(event);
        self.settle(machine, effects).await
    }

    /// Applies `effects` produced by `machine` and drains raised events.
    ///
    /// If an effect fails before any mutation was applied, the transition is
    /// abandoned and the machine keeps its previous state. Failures after a
    /// mutation are logged and the transition completes.
    async fn settle(&mut self, mut machine: PlaybackMachine, effects: Vec<Effect>) -> RoomResult<()> {
        let was_playing = self.machine.state().is_playing();
        let mut pending: VecDeque<Effect> = effects.into();
        let mut mutated = false;

        while let Some(effect) = pending.pop_front() {
            if let Effect::Raise(event) = effect {
                pending.extend(machine.send(event));
                continue;
            }
            match self.apply(effect).await {
                Ok(answer) => {
                    mutated |= effect.is_mutation();
                    if let Some(event) = answer {
                        pending.extend(machine.send(event));
                    }
                }
                Err(e) if !mutated => return Err(e),
                Err(e) => log::warn!(
                    "[Room] {} {:?} failed after state changed: {}",
                    self.room_id(),
                    effect,
                    e
                ),
            }
        }

        self.machine = machine;
        let playing = self.machine.state().is_playing();
        if playing != was_playing {
            self.deps.emitter.emit_room(RoomEvent::PlaybackChanged {
                room_id: self.state.room_id.clone(),
                playing,
                timestamp: now_millis(),
            });
        }
        Ok(())
    }

    /// Applies one effect. Returns the event the machine expects in answer,
    /// if any.
    async fn apply(&mut self, effect: Effect) -> RoomResult<Option<PlaybackEvent>> {
        match effect {
            Effect::NotifyPlay => self.deps.notifier.play(&self.state.room_id).await?,
            Effect::NotifyPause => self.deps.notifier.pause(&self.state.room_id).await?,
            Effect::StartTimer => self.start_timer(),
            Effect::CancelTimer => {
                let progress = self.cancel_timer().await;
                if progress.is_some_and(|t| t.phase == TimerPhase::Finished) {
                    log::debug!("[Room] {} track ended before the pause", self.room_id());
                    self.advance_queue();
                }
            }
            Effect::StoreTimer(timer) => self.state.store_timer(timer),
            Effect::AdvanceQueue => {
                return Ok(Some(if self.advance_queue() {
                    PlaybackEvent::NextTrackReady
                } else {
                    PlaybackEvent::GoToPaused
                }));
            }
            Effect::Raise(_) => {}
        }
        Ok(None)
    }

    /// Moves to the next queued track. Returns `false` if the queue was empty.
    fn advance_queue(&mut self) -> bool {
        let Some(track) = self.state.advance_queue().cloned() else {
            log::info!("[Room] {} reached the end of its queue", self.room_id());
            return false;
        };
        log::info!("[Room] {} now on {}", self.room_id(), track.id);
        self.deps.emitter.emit_room(RoomEvent::TrackChanged {
            room_id: self.state.room_id.clone(),
            track,
            timestamp: now_millis(),
        });
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Timer
    // ─────────────────────────────────────────────────────────────────────────

    fn start_timer(&mut self) {
        if let Some(stale) = self.active_timer.take() {
            stale.cancel.cancel();
        }
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let cancel = CancellationToken::new();

        let countdown = run_track_timer(
            self.state.room_id.clone(),
            self.state.timer(),
            cancel.clone(),
            Arc::clone(&self.deps.heartbeat),
            self.deps.checkpoint_interval,
        );
        let reports = self.timer_reports.clone();
        let handle = self.deps.spawner.spawn_joinable(async move {
            let outcome = AssertUnwindSafe(countdown).catch_unwind().await.ok();
            let _ = reports.send(TimerReport {
                generation,
                outcome,
            });
            outcome
        });

        self.active_timer = Some(ActiveTimer {
            generation,
            cancel,
            handle,
        });
    }

    /// Cancels the running timer and keeps the progress it reports.
    ///
    /// The timer may have reached its end before seeing the cancellation, in
    /// which case the returned progress is `Finished`.
    async fn cancel_timer(&mut self) -> Option<TimerState> {
        let active = self.active_timer.take()?;
        active.cancel.cancel();
        match active.handle.await {
            Ok(Some(progress)) => {
                self.state.store_timer(progress);
                Some(progress)
            }
            Ok(None) | Err(_) => {
                log::warn!(
                    "[Room] {} timer died before reporting progress",
                    self.room_id()
                );
                None
            }
        }
    }

    async fn handle_timer_report(&mut self, report: TimerReport) {
        let current = self
            .active_timer
            .as_ref()
            .is_some_and(|t| t.generation == report.generation);
        if !current {
            log::debug!(
                "[Room] {} ignoring stale timer report #{}",
                self.room_id(),
                report.generation
            );
            return;
        }
        self.active_timer = None;

        let event = match report.outcome {
            Some(timer) => PlaybackEvent::TimerExpired(timer),
            None => {
                log::error!("[Room] {} track timer panicked", self.room_id());
                PlaybackEvent::TimerFailed
            }
        };
        if let Err(e) = self.dispatch(event).await {
            log::warn!("[Room] {} timer completion aborted: {}", self.room_id(), e);
        }
    }

    async fn shutdown(mut self) {
        if let Some(active) = self.active_timer.take() {
            active.cancel.cancel();
            let _ = active.handle.await;
        }
        log::info!("[Room] {} stopped", self.room_id());
        self.deps.emitter.emit_room(RoomEvent::Terminated {
            room_id: self.state.room_id.clone(),
            timestamp: now_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::TrackCatalog;
    use crate::test_fixtures::{deps, ids, op, track, MockCatalog, MockNotifier, NotifierCall};

    fn params(track_ids: &[&str]) -> ListeningRoomParams {
        ListeningRoomParams {
            room_id: "room".into(),
            creator_user_id: "creator".into(),
            room_name: "Friday".into(),
            initial_track_ids: ids(track_ids),
        }
    }

    fn catalog() -> Arc<MockCatalog> {
        MockCatalog::with_tracks([track("a", 3_000), track("b", 5_000), track("c", 60_000)])
    }

    async fn exposed(handle: &RoomHandle) -> ListeningRoomExposedState {
        match handle.query().await.unwrap() {
            RoomSnapshot::Listening(state) => state,
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    async fn spawn_room(
        track_ids: &[&str],
    ) -> (RoomHandle, Arc<MockNotifier>, Arc<MockCatalog>) {
        let notifier = MockNotifier::new();
        let catalog = catalog();
        let (handle, _) = ListeningRoom::spawn(params(track_ids), deps(&notifier, &catalog))
            .await
            .unwrap();
        (handle, notifier, catalog)
    }

    #[tokio::test(start_paused = true)]
    async fn creation_with_one_track_rests_paused() {
        let (handle, notifier, _) = spawn_room(&["a"]).await;

        let state = exposed(&handle).await;
        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "a");
        assert!(state.pending_queue.is_empty());
        assert_eq!(state.users, vec!["creator".to_string()]);

        let calls = notifier.calls();
        assert_eq!(calls[1], NotifierCall::Pause("room".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn creation_is_acknowledged_before_queue_advances() {
        let (handle, notifier, _) = spawn_room(&["a", "b"]).await;

        let acknowledged = match &notifier.calls()[0] {
            NotifierCall::RoomCreated(state) => state.clone(),
            other => panic!("unexpected call: {:?}", other),
        };
        assert!(acknowledged.current_track.is_none());
        assert_eq!(acknowledged.pending_queue_ids, ids(&["a", "b"]));

        let state = exposed(&handle).await;
        assert_eq!(state.current_track.unwrap().id, "a");
        assert_eq!(state.pending_queue_ids, ids(&["b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn creation_dedups_initial_tracks() {
        let (handle, _, catalog) = spawn_room(&["a", "b", "a"]).await;

        let state = exposed(&handle).await;
        assert_eq!(state.current_track.unwrap().id, "a");
        assert_eq!(state.pending_queue_ids, ids(&["b"]));
        assert_eq!(catalog.requests()[0].0, ids(&["a", "b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_aborts_creation() {
        let notifier = MockNotifier::new();
        let catalog = catalog();
        catalog.set_failing(true);

        let result = ListeningRoom::spawn(params(&["a"]), deps(&notifier, &catalog)).await;

        assert!(matches!(result, Err(RoomError::Catalog(_))));
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_creation_ack_aborts_creation() {
        let notifier = MockNotifier::new();
        notifier.fail(op::ROOM_CREATION);
        let catalog = catalog();

        let result = ListeningRoom::spawn(params(&["a"]), deps(&notifier, &catalog)).await;

        assert!(matches!(result, Err(RoomError::Notifier(_))));
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Pause(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_keeps_only_played_interval() {
        let (handle, notifier, _) = spawn_room(&["c"]).await;

        handle.send(Signal::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(exposed(&handle).await.playing);

        handle.send(Signal::Pause).await.unwrap();
        let state = exposed(&handle).await;

        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "c");
        assert_eq!(state.timer.phase, TimerPhase::Pending);
        assert!((1_500..=1_501).contains(&state.timer.elapsed_ms));
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Play(_))), 1);
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Pause(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_plays_through_then_pauses_on_last_track() {
        let (handle, notifier, _) = spawn_room(&["a", "b"]).await;

        handle.send(Signal::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_010)).await;

        let state = exposed(&handle).await;
        assert!(state.playing);
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert!(state.pending_queue.is_empty());
        assert_eq!(state.timer, TimerState::idle(5_000));
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Play(_))), 2);

        tokio::time::sleep(Duration::from_millis(5_010)).await;
        let state = exposed(&handle).await;
        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "b");
        assert!(state.pending_queue.is_empty());
        assert_eq!(state.timer, TimerState::idle(5_000).finished());
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Pause(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_last_track_is_not_replayed() {
        let (handle, notifier, _) = spawn_room(&["a"]).await;

        handle.send(Signal::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_010)).await;

        let state = exposed(&handle).await;
        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "a");
        assert_eq!(state.timer.phase, TimerPhase::Finished);

        handle.send(Signal::Play).await.unwrap();
        assert!(!exposed(&handle).await.playing);
        assert_eq!(notifier.count(|c| matches!(c, NotifierCall::Play(_))), 1);
    }

    /// A room that is driven directly, without its loop.
    async fn idle_room(
        track_ids: &[&str],
    ) -> (
        ListeningRoom,
        mpsc::UnboundedReceiver<TimerReport>,
        Arc<MockNotifier>,
    ) {
        let notifier = MockNotifier::new();
        let catalog = catalog();
        let tracks = catalog.resolve(&ids(track_ids)).await.unwrap();
        let mut state = ListeningRoomState::new(params(track_ids), tracks);
        state.advance_queue();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let room = ListeningRoom {
            state,
            machine: PlaybackMachine::new(),
            deps: deps(&notifier, &catalog),
            active_timer: None,
            timer_generation: 0,
            timer_reports: reports_tx,
        };
        (room, reports_rx, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn pause_racing_track_end_advances_queue() {
        let (mut room, _reports, _) = idle_room(&["a", "b"]).await;

        room.dispatch(PlaybackEvent::Play).await.unwrap();
        // The timer ends, but its report is never picked up.
        tokio::time::sleep(Duration::from_millis(3_010)).await;
        room.dispatch(PlaybackEvent::Pause).await.unwrap();

        let state = room.export();
        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "b");
        assert_eq!(state.timer, TimerState::idle(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_is_monotonic_across_cycles() {
        let (handle, _, _) = spawn_room(&["c"]).await;
        let mut last = 0;

        for _ in 0..3 {
            handle.send(Signal::Play).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            handle.send(Signal::Pause).await.unwrap();

            let timer = exposed(&handle).await.timer;
            assert!(timer.elapsed_ms >= last);
            assert!(timer.elapsed_ms <= timer.total_duration_ms);
            last = timer.elapsed_ms;
        }
        assert!((7_500..=7_503).contains(&last));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_play_notification_stays_paused() {
        let (handle, notifier, _) = spawn_room(&["a", "b"]).await;
        notifier.fail(op::PLAY);

        handle.send(Signal::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_010)).await;

        let state = exposed(&handle).await;
        assert!(!state.playing);
        assert_eq!(state.current_track.unwrap().id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn join_acknowledges_full_state() {
        let (handle, notifier, _) = spawn_room(&["a"]).await;

        handle
            .send(Signal::Join {
                user_id: "guest".into(),
            })
            .await
            .unwrap();
        let state = exposed(&handle).await;

        assert_eq!(state.users, vec!["creator".to_string(), "guest".to_string()]);
        let joined = notifier
            .calls()
            .into_iter()
            .find_map(|c| match c {
                NotifierCall::Joined { state, user_id } => Some((state, user_id)),
                _ => None,
            })
            .unwrap();
        assert_eq!(joined.1, "guest");
        assert_eq!(joined.0.users, state.users);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_join_ack_leaves_users_unchanged() {
        let (handle, notifier, _) = spawn_room(&["a"]).await;
        notifier.fail(op::JOIN);

        handle
            .send(Signal::Join {
                user_id: "guest".into(),
            })
            .await
            .unwrap();

        assert_eq!(exposed(&handle).await.users, vec!["creator".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn playlist_signal_is_dropped() {
        let (handle, _, _) = spawn_room(&["a"]).await;

        handle
            .send(Signal::DeleteTracks {
                track_ids: ids(&["a"]),
                user_id: "u".into(),
                device_id: "d".into(),
            })
            .await
            .unwrap();

        assert_eq!(exposed(&handle).await.current_track.unwrap().id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_stops_loop_and_cancels_timer() {
        let (handle, _, _) = spawn_room(&["c"]).await;

        handle.send(Signal::Play).await.unwrap();
        handle.send(Signal::Terminate).await.unwrap();
        handle.closed().await;

        assert!(handle.is_closed());
        assert!(matches!(handle.query().await, Err(RoomError::RoomClosed(_))));
    }
}
