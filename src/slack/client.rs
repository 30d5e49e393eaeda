//! Slack Socket Mode client with a small buffered send queue.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackBlock, SlackChannelId, SlackClient, SlackClientEventsListenerEnvironment,
    SlackClientEventsUserState, SlackClientHyperHttpsConnector, SlackClientSession,
    SlackClientSocketModeConfig, SlackClientSocketModeListener, SlackMessageContent,
    SlackPushEventCallback, SlackSocketModeListenerCallbacks, SlackTs, UserCallbackResult,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dispatch::CommandEvent;
use crate::slack::{blocks, events};
use crate::{config::SlackConfig, AppError, Result};

const QUEUE_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Message to be delivered to Slack via `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct SlackMessage {
    /// Destination channel.
    pub channel: SlackChannelId,
    /// Plain message text.
    pub text: Option<String>,
    /// Optional Block Kit payload.
    pub blocks: Option<Vec<SlackBlock>>,
    /// Thread timestamp when replying to a specific message.
    pub thread_ts: Option<SlackTs>,
}

impl SlackMessage {
    /// Create a plain-text message for a channel.
    pub fn plain(channel: SlackChannelId, text: impl Into<String>) -> Self {
        Self {
            channel,
            text: Some(text.into()),
            blocks: None,
            thread_ts: None,
        }
    }

    fn into_request(self) -> SlackApiChatPostMessageRequest {
        let content = SlackMessageContent {
            text: self.text,
            blocks: self.blocks,
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
        };

        SlackApiChatPostMessageRequest {
            channel: self.channel,
            content,
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: Some(true),
            parse: None,
            thread_ts: self.thread_ts,
            username: None,
            reply_broadcast: None,
            unfurl_links: None,
            unfurl_media: None,
        }
    }
}

/// Slack Socket Mode wrapper that owns the buffered outgoing queue.
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    queue_tx: mpsc::Sender<SlackMessage>,
}

/// Join handles for Slack background tasks.
pub struct SlackRuntime {
    /// Outgoing queue drain task.
    pub queue_task: JoinHandle<()>,
    /// Socket Mode listener task.
    pub socket_task: JoinHandle<()>,
}

impl SlackService {
    /// Start the Slack client, the background sender task, and the Socket
    /// Mode listener. Inbound message events are forwarded as
    /// [`CommandEvent`]s on the returned channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn start(
        config: &SlackConfig,
    ) -> Result<(Self, SlackRuntime, mpsc::Receiver<CommandEvent>)> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.app_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let queue_task = Self::spawn_worker(Arc::clone(&client), bot_token.clone(), queue_rx);
        let socket_task = Self::spawn_socket_mode(&client, app_token, commands_tx);

        info!("slack service started with buffered queue and socket mode");

        Ok((
            Self {
                client,
                bot_token,
                queue_tx,
            },
            SlackRuntime {
                queue_task,
                socket_task,
            },
            commands_rx,
        ))
    }

    /// A clone of the outgoing queue sender for workers and the dispatcher.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<SlackMessage> {
        self.queue_tx.clone()
    }

    /// Post the command menu to the announce channel, bypassing the queue.
    ///
    /// Called once at startup; a failure here means the bot token is invalid
    /// or the channel is unreachable, and startup must abort.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the Slack API call fails.
    pub async fn publish_command_menu(
        &self,
        channel: SlackChannelId,
        menu: &[(&str, &str)],
    ) -> Result<()> {
        let message = SlackMessage {
            channel,
            text: Some("Pomodoro timer is online".into()),
            blocks: Some(blocks::command_menu_blocks(menu)),
            thread_ts: None,
        };

        self.http_session()
            .chat_post_message(&message.into_request())
            .await
            .map_err(|err| AppError::Slack(format!("failed to publish command menu: {err}")))?;

        info!("command menu published");
        Ok(())
    }

    fn spawn_worker(
        client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
        token: SlackApiToken,
        mut queue_rx: mpsc::Receiver<SlackMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let session = client.open_session(&token);
            while let Some(message) = queue_rx.recv().await {
                let request = message.into_request();
                // Notification delivery is best effort: a failed post is
                // logged and the message dropped, never retried.
                if let Err(error) = session.chat_post_message(&request).await {
                    warn!(?error, "slack post failed; message dropped");
                }
            }
            info!("slack sender task exiting");
        })
    }

    fn spawn_socket_mode(
        client: &Arc<SlackClient<SlackClientHyperHttpsConnector>>,
        app_token: SlackApiToken,
        commands_tx: mpsc::Sender<CommandEvent>,
    ) -> JoinHandle<()> {
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(client))
                .with_user_state(commands_tx),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                info!(?event, "socket hello");
            })
            .with_push_events(Self::on_push_event);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }

    /// Push-event callback. Slack Socket Mode requires a non-capturing `fn`
    /// pointer here, so the command channel is threaded in via the listener's
    /// user-state storage rather than captured by the callback.
    async fn on_push_event(
        event: SlackPushEventCallback,
        _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
        state: SlackClientEventsUserState,
    ) -> UserCallbackResult<()> {
        if let Some(command) = events::command_event(event) {
            let guard = state.read().await;
            if let Some(commands_tx) = guard.get_user_state::<mpsc::Sender<CommandEvent>>() {
                // The socket callback must never block on the dispatch loop;
                // a full channel drops the message.
                if let Err(err) = commands_tx.try_send(command) {
                    warn!(%err, "command channel full; dropping inbound message");
                }
            }
        }
        Ok(())
    }

    /// Create an HTTP session for direct API calls using the bot token.
    #[must_use]
    pub fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }
}
