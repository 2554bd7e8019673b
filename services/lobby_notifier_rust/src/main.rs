use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wzlobby_rust_core::clients::TcpLobbyConnector;

use lobby_notifier_rust::config::Config;
use lobby_notifier_rust::health::{self, HealthMonitor};
use lobby_notifier_rust::webhook_client::{LogSink, WebhookSink};
use lobby_notifier_rust::{
    Caller, ChannelRegistry, CommandHandler, GamesQuery, LobbyPoller, LobbyState, MessageSink,
    NotificationDispatcher, PollerSettings,
};

/// Read commands from stdin until EOF; the console user is an admin.
async fn console_loop(commands: Arc<CommandHandler>) {
    let caller = Caller::new("console", true);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Console ready; type `games`, `notifications <channel> [on|off]` or `status`");

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(reply) = commands.handle_line(&caller, &line) {
                    println!("{reply}");
                }
            }
            Ok(None) => {
                info!("Console closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting lobby notifier...");

    let cfg = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Config: lobby={}:{} interval={:?} channels={} subscribed={} webhook={}",
        cfg.lobby_address,
        cfg.lobby_port,
        cfg.poll_interval,
        cfg.channels.len(),
        cfg.notify_channels.len(),
        cfg.webhook_url.is_some()
    );

    let registry = Arc::new(ChannelRegistry::with_targets(
        cfg.notify_default,
        &cfg.channels,
        &cfg.notify_channels,
    ));

    let sink: Arc<dyn MessageSink> = match &cfg.webhook_url {
        Some(url) => {
            let webhook = WebhookSink::new(url.clone(), cfg.call_timeout)?;
            info!("Delivering lobby updates to {}", webhook.url());
            Arc::new(webhook)
        }
        None => {
            warn!("WEBHOOK_URL not set; lobby updates will only be logged");
            Arc::new(LogSink)
        }
    };

    let state = Arc::new(LobbyState::new());
    let health = Arc::new(HealthMonitor::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(registry.clone(), sink));
    let connector = Arc::new(TcpLobbyConnector::new(cfg.connection()));

    let poller = LobbyPoller::new(
        connector,
        state.clone(),
        dispatcher,
        health.clone(),
        PollerSettings {
            interval: cfg.poll_interval,
            relogin_interval: cfg.relogin_interval,
        },
    );
    let poll_loop = poller.spawn();

    let status_task = tokio::spawn(health::status_loop(health.clone(), cfg.status_interval));

    let console_task = if cfg.console_enabled {
        let commands = Arc::new(CommandHandler::new(
            GamesQuery::new(state.clone()),
            registry.clone(),
            health.clone(),
        ));
        Some(tokio::spawn(console_loop(commands)))
    } else {
        None
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    poller.stop().await;
    if let Err(e) = poll_loop.await {
        warn!("Poll loop ended abnormally: {}", e);
    }
    status_task.abort();
    info!("{}", health.status_line());

    if let Some(console) = console_task {
        console.abort();
        // A pending stdin read holds a blocking thread the runtime would wait on
        std::process::exit(0);
    }
    Ok(())
}
