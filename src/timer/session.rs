//! Timer session record shared between the registry and its worker task.

use std::time::Duration;

use slack_morphism::prelude::{SlackChannelId, SlackUserId};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// The two alternating interval kinds of a pomodoro timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Working interval.
    Focus,
    /// Break interval.
    Rest,
}

impl Phase {
    /// The phase that follows this one in the alternation.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Focus => Self::Rest,
            Self::Rest => Self::Focus,
        }
    }
}

/// Interval lengths for both phases of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durations {
    /// Length of the focus (work) interval.
    pub focus: Duration,
    /// Length of the rest (break) interval.
    pub rest: Duration,
}

impl Durations {
    /// The configured length of the given phase.
    #[must_use]
    pub fn for_phase(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Focus => self.focus,
            Phase::Rest => self.rest,
        }
    }
}

/// Mutable timer state guarded by the session mutex.
#[derive(Debug)]
struct TimerState {
    phase: Phase,
    durations: Durations,
}

/// One user's active timer session.
///
/// The registry and the running [`IntervalWorker`](crate::timer::IntervalWorker)
/// both hold an `Arc` to the same record, so duration updates applied by a
/// reconfigure command are observed by the worker at its next scheduling
/// decision without restarting the task. An interval already in progress is
/// never interrupted; the new length applies from the following interval of
/// that kind.
#[derive(Debug)]
pub struct Session {
    user_id: SlackUserId,
    channel: SlackChannelId,
    state: Mutex<TimerState>,
    cancel: CancellationToken,
}

impl Session {
    /// Construct a new session starting in the focus phase.
    #[must_use]
    pub fn new(user_id: SlackUserId, channel: SlackChannelId, durations: Durations) -> Self {
        Self {
            user_id,
            channel,
            state: Mutex::new(TimerState {
                phase: Phase::Focus,
                durations,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// The owning Slack user.
    #[must_use]
    pub fn user_id(&self) -> &SlackUserId {
        &self.user_id
    }

    /// Channel where transition notifications are delivered.
    #[must_use]
    pub fn channel(&self) -> &SlackChannelId {
        &self.channel
    }

    /// A clone of the session's cancellation token for the worker task.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the worker task to stop.
    ///
    /// Idempotent and non-blocking: safe to call while holding the registry
    /// lock, and safe to call after the task has already exited.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// The phase currently in progress.
    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    /// Snapshot of the currently configured interval lengths.
    pub async fn durations(&self) -> Durations {
        self.state.lock().await.durations
    }

    /// Length of the interval currently in progress.
    ///
    /// Read by the worker at each scheduling decision so that reconfiguration
    /// applied before an interval begins is honored for that interval.
    pub async fn current_interval(&self) -> Duration {
        let state = self.state.lock().await;
        state.durations.for_phase(state.phase)
    }

    /// Advance to the next phase and return it.
    pub async fn advance(&self) -> Phase {
        let mut state = self.state.lock().await;
        state.phase = state.phase.next();
        state.phase
    }

    /// Update the configured length of one interval kind.
    ///
    /// Takes effect at the worker's next scheduling decision; the interval
    /// currently in progress is unaffected.
    pub async fn set_duration(&self, phase: Phase, duration: Duration) {
        let mut state = self.state.lock().await;
        match phase {
            Phase::Focus => state.durations.focus = duration,
            Phase::Rest => state.durations.rest = duration,
        }
    }
}
