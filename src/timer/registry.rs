//! Concurrency-safe registry of active timer sessions keyed by Slack user.
//!
//! All lifecycle operations lock the one session map for their full critical
//! section, so concurrent commands never observe a half-removed session.
//! Registration and launch are separate steps: the dispatch loop registers a
//! session first and only then launches its worker task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::SlackUserId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::slack::client::SlackMessage;
use crate::timer::session::{Phase, Session};
use crate::timer::worker::IntervalWorker;
use crate::timer::{MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};
use crate::{AppError, Result};

/// A registered session plus the join handle of its running worker task.
struct SessionEntry {
    session: Arc<Session>,
    task: Option<JoinHandle<()>>,
}

/// The user → session map guarding timer lifecycle against concurrent commands.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SlackUserId, SessionEntry>>,
    outbound: mpsc::Sender<SlackMessage>,
}

impl SessionRegistry {
    /// Create an empty registry whose workers notify through `outbound`.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<SlackMessage>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    /// Register a new session without launching its worker task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyExists` if the user already has a session.
    pub async fn add_session(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let user_id = session.user_id().clone();

        if sessions.contains_key(&user_id) {
            return Err(AppError::AlreadyExists(format!(
                "user {user_id} already has a timer session"
            )));
        }

        sessions.insert(
            user_id.clone(),
            SessionEntry {
                session: Arc::new(session),
                task: None,
            },
        );
        debug!(%user_id, "session registered");
        Ok(())
    }

    /// Launch the interval worker for a registered session.
    ///
    /// The caller must invoke this at most once per registration; the
    /// registry performs no double-launch de-duplication.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no session is registered for the user.
    pub async fn start_session(&self, user_id: &SlackUserId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(user_id).ok_or_else(|| {
            AppError::NotFound(format!("user {user_id} has no timer session"))
        })?;

        let worker = IntervalWorker::new(Arc::clone(&entry.session), self.outbound.clone());
        entry.task = Some(worker.spawn());
        info!(%user_id, "timer session started");
        Ok(())
    }

    /// Stop a session's worker task and remove the session.
    ///
    /// Cancellation is signalled through the session's token, which is
    /// idempotent and never blocks, so the registry lock is held only for
    /// the map update and the signal itself.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no session is registered for the user.
    pub async fn stop_session(&self, user_id: &SlackUserId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.remove(user_id).ok_or_else(|| {
            AppError::NotFound(format!("user {user_id} has no timer session"))
        })?;

        entry.session.stop();
        drop(entry.task);
        info!(%user_id, "timer session stopped");
        Ok(())
    }

    /// Update one interval length of an active session.
    ///
    /// Writes through the shared session record, so the running worker picks
    /// up the new value at its next scheduling decision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `minutes` is outside the accepted
    /// range, or `AppError::NotFound` if the user has no session.
    pub async fn reconfigure(
        &self,
        user_id: &SlackUserId,
        phase: Phase,
        minutes: u64,
    ) -> Result<()> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            return Err(AppError::InvalidInput(format!(
                "interval must be between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES} minutes"
            )));
        }

        let sessions = self.sessions.lock().await;
        let entry = sessions.get(user_id).ok_or_else(|| {
            AppError::NotFound(format!("user {user_id} has no timer session"))
        })?;

        entry
            .session
            .set_duration(phase, Duration::from_secs(minutes * 60))
            .await;
        info!(%user_id, ?phase, minutes, "timer session reconfigured");
        Ok(())
    }

    /// Look up the live session record for a user.
    pub async fn session(&self, user_id: &SlackUserId) -> Option<Arc<Session>> {
        let sessions = self.sessions.lock().await;
        sessions.get(user_id).map(|entry| Arc::clone(&entry.session))
    }

    /// Number of currently registered sessions.
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Stop every session and wait for its worker task to exit.
    ///
    /// Called during orderly shutdown so no timer task outlives the
    /// dispatch loop.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.lock().await;
        let drained: Vec<SessionEntry> = sessions.drain().map(|(_, entry)| entry).collect();
        drop(sessions);

        let count = drained.len();
        for entry in drained {
            entry.session.stop();
            if let Some(task) = entry.task {
                let _ = task.await;
            }
        }

        if count > 0 {
            info!(count, "stopped all timer sessions");
        }
    }
}
