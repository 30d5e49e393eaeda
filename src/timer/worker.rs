//! Background interval worker driving one session's focus/rest alternation.
//!
//! Each started session gets an [`IntervalWorker`] task that sleeps for the
//! current interval, flips the session phase, and emits one transition
//! notification per flip until the session's cancellation token fires.
//! Notifications are delivered via the outbound `tokio::sync::mpsc` queue;
//! delivery is best effort and never stops the timer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::slack::client::SlackMessage;
use crate::timer::session::{Phase, Session};

/// Notification text sent when a focus interval begins.
pub const FOCUS_MESSAGE: &str = "It's working time";

/// Notification text sent when a rest interval begins.
pub const REST_MESSAGE: &str = "It's time to chill";

/// Builder for a per-session interval worker.
///
/// Call [`spawn`](Self::spawn) to start the background timer task.
pub struct IntervalWorker {
    session: Arc<Session>,
    outbound: mpsc::Sender<SlackMessage>,
}

impl IntervalWorker {
    /// Construct a new worker (does not start the timer yet).
    #[must_use]
    pub fn new(session: Arc<Session>, outbound: mpsc::Sender<SlackMessage>) -> Self {
        Self { session, outbound }
    }

    /// Spawn the background timer task and return its join handle.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        let span = info_span!("interval_worker", user_id = %self.session.user_id());
        tokio::spawn(Self::run(self.session, self.outbound).instrument(span))
    }

    /// Core alternation loop.
    async fn run(session: Arc<Session>, outbound: mpsc::Sender<SlackMessage>) {
        let cancel = session.cancel_token();

        loop {
            // Read the interval length at scheduling time so a reconfigure
            // applied between intervals is honored for the next one.
            let interval = session.current_interval().await;

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("interval worker cancelled");
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }

            // The timer and a stop request can fire together; cancellation
            // wins and no further notification is emitted.
            if cancel.is_cancelled() {
                debug!("interval worker cancelled");
                return;
            }

            let phase = session.advance().await;
            debug!(?phase, "interval elapsed");

            let text = match phase {
                Phase::Focus => FOCUS_MESSAGE,
                Phase::Rest => REST_MESSAGE,
            };
            let message = SlackMessage::plain(session.channel().clone(), text);
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("interval worker cancelled");
                    return;
                }
                result = outbound.send(message) => {
                    if let Err(err) = result {
                        warn!(%err, "could not deliver transition notification");
                    }
                }
            }
        }
    }
}
