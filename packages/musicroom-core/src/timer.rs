//! Durable track timer.
//!
//! A track timer counts down the remaining duration of the current track while
//! emitting a liveness checkpoint every interval. It ends either because the
//! track finished or because its [`CancellationToken`] was triggered, and in
//! both cases reports the resulting [`TimerState`].
//!
//! The task never retries. A supervisor restarting it after a crash simply
//! runs it again with the most recent checkpointed `elapsed_ms`, which is why
//! [`run_track_timer`] accepts any state where `elapsed_ms <= total_duration_ms`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle phase of a track timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// The track has not been played since it became current.
    #[default]
    Idle,
    /// The track was played and interrupted before its end.
    Pending,
    /// The track was played to its end.
    Finished,
}

/// Progress of the current track.
///
/// Invariant: `elapsed_ms <= total_duration_ms`, and `elapsed_ms` never
/// decreases for a given track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub phase: TimerPhase,
    pub elapsed_ms: u64,
    pub total_duration_ms: u64,
}

impl TimerState {
    /// Fresh timer for a track of the given duration.
    #[must_use]
    pub fn idle(total_duration_ms: u64) -> Self {
        Self {
            phase: TimerPhase::Idle,
            elapsed_ms: 0,
            total_duration_ms,
        }
    }

    /// Time left before the track ends.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms.saturating_sub(self.elapsed_ms))
    }

    /// State reported when the countdown reached its end.
    #[must_use]
    pub fn finished(&self) -> Self {
        Self {
            phase: TimerPhase::Finished,
            elapsed_ms: self.total_duration_ms,
            total_duration_ms: self.total_duration_ms,
        }
    }

    /// State after `played` more time was spent on the track without finishing it.
    ///
    /// Clamped to the total duration so the invariant holds even if the
    /// interruption races the natural end.
    #[must_use]
    pub fn interrupted(&self, played: Duration) -> Self {
        Self {
            phase: TimerPhase::Pending,
            elapsed_ms: self.advanced_by(played),
            total_duration_ms: self.total_duration_ms,
        }
    }

    fn advanced_by(&self, played: Duration) -> u64 {
        let played_ms = u64::try_from(played.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_ms
            .saturating_add(played_ms)
            .min(self.total_duration_ms)
    }
}

/// Receiver of liveness checkpoints from running timers.
///
/// Checkpoints carry the progress at the time they were emitted, so a
/// supervisor that restarts a dead timer can resume from the last one.
pub trait TimerHeartbeat: Send + Sync {
    /// Records that the timer of `room_id` is alive with the given progress.
    fn beat(&self, room_id: &str, progress: &TimerState);
}

/// Heartbeat sink that only logs. Used when no supervisor is attached.
pub struct LoggingHeartbeat;

impl TimerHeartbeat for LoggingHeartbeat {
    fn beat(&self, room_id: &str, progress: &TimerState) {
        log::trace!(
            "[Timer] {} alive at {}/{}ms",
            room_id,
            progress.elapsed_ms,
            progress.total_duration_ms
        );
    }
}

/// Runs the countdown for the remaining part of `timer`.
///
/// Returns `timer.finished()` when the remaining duration has elapsed, or a
/// [`TimerPhase::Pending`] state with the time actually played when `cancel`
/// fires first. Cancellation is observed immediately, well within one
/// checkpoint interval.
pub async fn run_track_timer(
    room_id: String,
    timer: TimerState,
    cancel: CancellationToken,
    heartbeat: Arc<dyn TimerHeartbeat>,
    checkpoint_interval: Duration,
) -> TimerState {
    let started = Instant::now();
    let deadline = tokio::time::sleep(timer.remaining());
    tokio::pin!(deadline);

    let mut checkpoints = interval_at(started + checkpoint_interval, checkpoint_interval);
    checkpoints.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::debug!(
        "[Timer] {} started with {}ms remaining",
        room_id,
        timer.remaining().as_millis()
    );

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let state = timer.interrupted(started.elapsed());
                log::debug!("[Timer] {} cancelled at {}ms", room_id, state.elapsed_ms);
                return state;
            }
            _ = &mut deadline => {
                log::debug!("[Timer] {} expired", room_id);
                return timer.finished();
            }
            _ = checkpoints.tick() => {
                heartbeat.beat(&room_id, &timer.interrupted(started.elapsed()));
            }
        }
    }
}
