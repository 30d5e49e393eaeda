//! Command dispatch loop translating inbound Slack messages into registry
//! operations and threaded replies.
//!
//! The loop is the single consumer of the inbound command channel fed by the
//! Socket Mode push-event callback. It never waits on a session's timing:
//! every registry call returns as soon as the registry lock is released.

use std::sync::Arc;

use slack_morphism::prelude::{SlackChannelId, SlackTs, SlackUserId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::slack::client::SlackMessage;
use crate::timer::{
    Durations, Phase, Session, SessionRegistry, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES,
};
use crate::{AppError, Result};

/// Command menu published to the announce channel at startup.
pub const COMMAND_MENU: [(&str, &str); 4] = [
    ("start", "Start pomodoro timer"),
    ("finish", "Finish pomodoro timer"),
    ("set_rest_time", "Set rest time (in minutes)"),
    ("set_work_time", "Set working time (in minutes)"),
];

const REPLY_STARTED: &str = "Your Pomodoro timer has started! Now go to work";
const REPLY_ALREADY_RUNNING: &str = "Your Pomodoro timer is already working";
const REPLY_STOPPED: &str = "Your Pomodoro timer has stopped. See you next time!";
const REPLY_NOT_RUNNING: &str = "You don't have a Pomodoro timer launched";
const REPLY_INVALID_INPUT: &str = "The input is invalid, please enter a valid number";
const REPLY_MISSING_INPUT: &str = "input must be a valid integer from 1 to 90";
const REPLY_START_FAILED: &str =
    "Could not start Pomodoro timer. Contact administrator about potential bug";

/// One inbound message event from the transport, already reduced to the
/// fields the dispatch loop needs.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    /// The acting user.
    pub user: SlackUserId,
    /// Channel the message was posted in; replies and notifications go here.
    pub channel: SlackChannelId,
    /// Timestamp of the originating message, used to thread replies.
    pub ts: SlackTs,
    /// Raw message text.
    pub text: String,
}

/// Recognized textual commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register and launch a new timer session.
    Start,
    /// Stop and remove the active timer session.
    Finish,
    /// Update the rest interval length; carries the raw argument.
    SetRestTime(Option<String>),
    /// Update the focus interval length; carries the raw argument.
    SetWorkTime(Option<String>),
    /// Anything else; carries the unrecognized command word.
    Unknown(String),
}

impl Command {
    /// Parse a message text into a command.
    ///
    /// The first whitespace-separated token selects the command (a leading
    /// `/` is accepted and stripped); the second token, if any, is kept as
    /// the raw argument. Returns `None` for blank text so ordinary chatter
    /// is ignored rather than answered with an error.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let word = tokens.next()?;
        let name = word.strip_prefix('/').unwrap_or(word).to_lowercase();
        let arg = tokens.next().map(ToOwned::to_owned);

        Some(match name.as_str() {
            "start" => Self::Start,
            "finish" => Self::Finish,
            "set_rest_time" => Self::SetRestTime(arg),
            "set_work_time" => Self::SetWorkTime(arg),
            _ => Self::Unknown(name),
        })
    }
}

/// Parse a textual minutes argument, enforcing the accepted range.
fn parse_minutes(arg: Option<&str>) -> Result<u64> {
    let raw = arg.ok_or_else(|| AppError::InvalidInput(REPLY_MISSING_INPUT.into()))?;

    let value: i64 = raw
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("entered value - {raw}")))?;

    u64::try_from(value)
        .ok()
        .filter(|minutes| (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(minutes))
        .ok_or_else(|| AppError::InvalidInput(format!("entered value - {raw}")))
}

/// The single control loop owning registry access and user-facing replies.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    outbound: mpsc::Sender<SlackMessage>,
    defaults: Durations,
}

impl Dispatcher {
    /// Construct a dispatcher over the given registry and outbound queue.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        outbound: mpsc::Sender<SlackMessage>,
        defaults: Durations,
    ) -> Self {
        Self {
            registry,
            outbound,
            defaults,
        }
    }

    /// Run until the cancellation token fires or the command channel closes,
    /// then stop every live session and return.
    pub async fn run(self, mut commands: mpsc::Receiver<CommandEvent>, cancel: CancellationToken) {
        info!("command dispatch loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("dispatch loop cancelled");
                    break;
                }
                event = commands.recv() => {
                    let Some(event) = event else {
                        info!("command channel closed");
                        break;
                    };
                    self.handle(event).await;
                }
            }
        }

        self.registry.shutdown().await;
        info!("command dispatch loop stopped");
    }

    /// Handle one inbound message event.
    async fn handle(&self, event: CommandEvent) {
        let Some(command) = Command::parse(&event.text) else {
            return;
        };
        info!(user_id = %event.user, ?command, "received command");

        match command {
            Command::Start => self.handle_start(&event).await,
            Command::Finish => self.handle_finish(&event).await,
            Command::SetRestTime(arg) => {
                self.handle_reconfigure(&event, Phase::Rest, arg.as_deref())
                    .await;
            }
            Command::SetWorkTime(arg) => {
                self.handle_reconfigure(&event, Phase::Focus, arg.as_deref())
                    .await;
            }
            Command::Unknown(name) => {
                self.reply(&event, format!("Unknown command - {name}")).await;
            }
        }
    }

    async fn handle_start(&self, event: &CommandEvent) {
        let session = Session::new(event.user.clone(), event.channel.clone(), self.defaults);

        match self.registry.add_session(session).await {
            Ok(()) => {}
            Err(AppError::AlreadyExists(_)) => {
                self.reply(event, REPLY_ALREADY_RUNNING).await;
                return;
            }
            Err(err) => {
                warn!(%err, "failed to register session");
                self.reply(event, REPLY_START_FAILED).await;
                return;
            }
        }

        match self.registry.start_session(&event.user).await {
            Ok(()) => self.reply(event, REPLY_STARTED).await,
            Err(err) => {
                warn!(%err, "failed to launch timer task");
                self.reply(event, REPLY_START_FAILED).await;
            }
        }
    }

    async fn handle_finish(&self, event: &CommandEvent) {
        match self.registry.stop_session(&event.user).await {
            Ok(()) => self.reply(event, REPLY_STOPPED).await,
            Err(AppError::NotFound(_)) => self.reply(event, REPLY_NOT_RUNNING).await,
            Err(err) => warn!(%err, "failed to stop session"),
        }
    }

    async fn handle_reconfigure(&self, event: &CommandEvent, phase: Phase, arg: Option<&str>) {
        let minutes = match parse_minutes(arg) {
            Ok(minutes) => minutes,
            Err(_) => {
                let text = if arg.is_none() {
                    REPLY_MISSING_INPUT
                } else {
                    REPLY_INVALID_INPUT
                };
                self.reply(event, text).await;
                return;
            }
        };

        match self.registry.reconfigure(&event.user, phase, minutes).await {
            Ok(()) => {
                let text = match phase {
                    Phase::Rest => format!("Your rest time is updated to {minutes} minutes"),
                    Phase::Focus => format!("Your work time is updated to {minutes} minutes"),
                };
                self.reply(event, text).await;
            }
            Err(AppError::NotFound(_)) => self.reply(event, REPLY_NOT_RUNNING).await,
            Err(err) => {
                warn!(%err, "failed to reconfigure session");
                self.reply(event, REPLY_INVALID_INPUT).await;
            }
        }
    }

    /// Send a threaded reply to the originating message (best effort).
    async fn reply(&self, event: &CommandEvent, text: impl Into<String>) {
        let message = SlackMessage {
            channel: event.channel.clone(),
            text: Some(text.into()),
            blocks: None,
            thread_ts: Some(event.ts.clone()),
        };
        if let Err(err) = self.outbound.send(message).await {
            warn!(%err, "could not deliver command reply");
        }
    }
}
