//! Hierarchical playback state machine.
//!
//! ```text
//! Paused ──Play──▶ Playing
//!   ▲               ├─ LaunchingTimer ──TimerLaunched──▶ WaitingTimerEnd
//!   │               ├─ WaitingTimerEnd ──TimerExpired──▶ TimeoutExpired
//!   │               └─ TimeoutExpired  (advance queue)
//!   │                    └──NextTrackReady──▶ LaunchingTimer
//!   └──── Pause (from WaitingTimerEnd) / GoToPaused / TimerFailed
//! ```
//!
//! The machine is pure: [`PlaybackMachine::send`] returns an ordered list of
//! [`Effect`]s and never touches room state. The room loop applies them and
//! feeds raised events back until none are left. Applying
//! [`Effect::AdvanceQueue`] answers with `NextTrackReady` when a new track
//! became current, or `GoToPaused` when the queue had run dry.

use crate::timer::TimerState;

/// Child state of `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayingPhase {
    LaunchingTimer,
    WaitingTimerEnd,
    TimeoutExpired,
}

/// Active leaf of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing(PlayingPhase),
}

impl PlaybackState {
    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing(_))
    }
}

/// Events understood by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    /// The track timer task was accepted by the runtime.
    TimerLaunched,
    /// The track timer ran to completion with the given final state.
    TimerExpired(TimerState),
    /// The track timer task died without reporting.
    TimerFailed,
    /// Internal: the queue advanced to a new track after expiry.
    NextTrackReady,
    /// Internal: leave `TimeoutExpired` with nothing left to play.
    GoToPaused,
}

/// Side effects requested by a transition, applied in order by the room loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    NotifyPlay,
    NotifyPause,
    /// Start the track timer for the remaining part of the current track.
    StartTimer,
    /// Cancel the running track timer and keep its reported progress.
    CancelTimer,
    StoreTimer(TimerState),
    /// Make the head of the queue current. The room answers with
    /// `NextTrackReady` or `GoToPaused`.
    AdvanceQueue,
    /// Feed an internal event back into the machine.
    Raise(PlaybackEvent),
}

impl Effect {
    /// Whether applying this effect changes room state or running tasks.
    ///
    /// Once such an effect was applied the transition can no longer be
    /// abandoned.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::StartTimer | Self::CancelTimer | Self::StoreTimer(_) | Self::AdvanceQueue
        )
    }
}

/// The playback state machine of one listening room.
#[derive(Debug, Clone)]
pub struct PlaybackMachine {
    state: PlaybackState,
}

impl Default for PlaybackMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackMachine {
    /// Creates a machine resting in `Paused`, entry effects not yet run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Paused,
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Enters the initial state and returns its entry effects.
    pub fn start(&mut self) -> Vec<Effect> {
        self.enter_paused()
    }

    /// Handles `event` and returns the effects of the resulting transition.
    ///
    /// Events the active state does not handle are ignored and yield no
    /// effects.
    pub fn send(&mut self, event: PlaybackEvent) -> Vec<Effect> {
        use PlaybackEvent as E;
        use PlayingPhase as P;

        match (self.state, event) {
            (PlaybackState::Paused, E::Play) => self.enter_playing(),
            (PlaybackState::Playing(P::LaunchingTimer), E::TimerLaunched) => {
                self.state = PlaybackState::Playing(P::WaitingTimerEnd);
                Vec::new()
            }
            (PlaybackState::Playing(P::WaitingTimerEnd), E::TimerExpired(timer)) => {
                self.state = PlaybackState::Playing(P::TimeoutExpired);
                vec![Effect::StoreTimer(timer), Effect::AdvanceQueue]
            }
            (PlaybackState::Playing(P::TimeoutExpired), E::NextTrackReady) => self.enter_playing(),
            (PlaybackState::Playing(P::WaitingTimerEnd), E::Pause) => {
                let mut effects = vec![Effect::CancelTimer];
                effects.extend(self.enter_paused());
                effects
            }
            (PlaybackState::Playing(P::TimeoutExpired), E::GoToPaused) => self.enter_paused(),
            (PlaybackState::Playing(P::LaunchingTimer | P::WaitingTimerEnd), E::TimerFailed) => {
                self.enter_paused()
            }
            (state, event) => {
                log::trace!("[Playback] {:?} ignores {:?}", state, event);
                Vec::new()
            }
        }
    }

    fn enter_playing(&mut self) -> Vec<Effect> {
        self.state = PlaybackState::Playing(PlayingPhase::LaunchingTimer);
        // Playing entry, then LaunchingTimer entry.
        vec![
            Effect::NotifyPlay,
            Effect::StartTimer,
            Effect::Raise(PlaybackEvent::TimerLaunched),
        ]
    }

    fn enter_paused(&mut self) -> Vec<Effect> {
        self.state = PlaybackState::Paused;
        vec![Effect::NotifyPause]
    }
}
