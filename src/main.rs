#![forbid(unsafe_code)]

//! `pomodoro-intercom` — Slack pomodoro timer bot binary.
//!
//! Bootstraps configuration, connects to Slack over Socket Mode, publishes
//! the command menu, and runs the command dispatch loop until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use slack_morphism::prelude::SlackChannelId;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use pomodoro_intercom::config::GlobalConfig;
use pomodoro_intercom::dispatch::{Dispatcher, COMMAND_MENU};
use pomodoro_intercom::slack::client::SlackService;
use pomodoro_intercom::timer::SessionRegistry;
use pomodoro_intercom::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pomodoro-intercom", about = "Slack pomodoro timer bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("pomodoro-intercom bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;

    // Load Slack credentials from keyring / env vars.
    config.load_credentials().await?;
    info!("configuration loaded");

    // ── Start Slack service ─────────────────────────────
    let (slack, slack_runtime, commands_rx) = SlackService::start(&config.slack).map_err(|err| {
        error!(%err, "slack service start failed");
        err
    })?;

    // Publishing the menu doubles as bot-token validation; a failure here
    // aborts startup with a non-zero exit status.
    let announce_channel = SlackChannelId(config.slack.channel_id.clone());
    slack
        .publish_command_menu(announce_channel, &COMMAND_MENU)
        .await?;

    // ── Start the dispatch loop ─────────────────────────
    let ct = CancellationToken::new();
    let registry = Arc::new(SessionRegistry::new(slack.sender()));
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        slack.sender(),
        config.default_durations(),
    );
    let dispatch_handle = tokio::spawn(dispatcher.run(commands_rx, ct.clone()));

    info!("pomodoro bot ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // The dispatch loop stops every live session before returning.
    let _ = dispatch_handle.await;

    // Brief sleep to let the outgoing queue drain, then drop the service
    // so the sender task exits. The socket listener task ends with the
    // process.
    tokio::time::sleep(Duration::from_millis(500)).await;
    drop(slack);
    drop(registry);
    let _ = slack_runtime.queue_task.await;

    info!("pomodoro-intercom shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
