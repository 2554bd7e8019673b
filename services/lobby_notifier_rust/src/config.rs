use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

use wzlobby_rust_core::clients::{Credentials, LobbyConnectionConfig};
use wzlobby_rust_core::models::NotificationTarget;

#[derive(Debug, Clone)]
pub struct Config {
    pub lobby_address: String,
    pub lobby_port: u16,
    pub lobby_user: String,
    pub lobby_password: String,

    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub relogin_interval: Duration,

    /// Notify flag for targets nobody has configured yet
    pub notify_default: bool,
    /// Targets the host knows about
    pub channels: Vec<NotificationTarget>,
    /// Targets subscribed at startup
    pub notify_channels: Vec<NotificationTarget>,

    pub webhook_url: Option<String>,
    pub status_interval: Duration,
    pub console_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let lobby_address = env::var("LOBBY_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());

        let lobby_port = parse_positive_env("LOBBY_PORT", 9990)?;
        let lobby_port = u16::try_from(lobby_port)
            .map_err(|_| anyhow!("Invalid LOBBY_PORT: {lobby_port} (expected 1-65535)"))?;

        let lobby_user = env::var("LOBBY_USER").context("LOBBY_USER must be set")?;
        let lobby_password = env::var("LOBBY_PASSWORD").context("LOBBY_PASSWORD must be set")?;

        let poll_interval = Duration::from_secs(parse_positive_env("LOBBY_INTERVAL_SECS", 5)?);
        let connect_timeout =
            Duration::from_secs(parse_positive_env("LOBBY_CONNECT_TIMEOUT_SECS", 10)?);
        let call_timeout = Duration::from_secs(parse_positive_env("LOBBY_CALL_TIMEOUT_SECS", 10)?);
        let relogin_interval =
            Duration::from_secs(parse_positive_env("LOBBY_RELOGIN_INTERVAL_SECS", 60)?);

        let notify_default = parse_bool_env("LOBBY_NOTIFY_DEFAULT", false);
        let channels = parse_targets_env("LOBBY_CHANNELS")?;
        let notify_channels = parse_targets_env("LOBBY_NOTIFY_CHANNELS")?;

        let webhook_url = env::var("WEBHOOK_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let status_interval = Duration::from_secs(parse_positive_env("STATUS_INTERVAL_SECS", 60)?);
        let console_enabled = parse_bool_env("CONSOLE_ENABLED", true);

        Ok(Self {
            lobby_address,
            lobby_port,
            lobby_user,
            lobby_password,
            poll_interval,
            connect_timeout,
            call_timeout,
            relogin_interval,
            notify_default,
            channels,
            notify_channels,
            webhook_url,
            status_interval,
            console_enabled,
        })
    }

    /// Connection settings for the lobby client
    pub fn connection(&self) -> LobbyConnectionConfig {
        LobbyConnectionConfig {
            address: self.lobby_address.clone(),
            port: self.lobby_port,
            credentials: Credentials {
                username: self.lobby_user.clone(),
                password: self.lobby_password.clone(),
            },
            connect_timeout: self.connect_timeout,
            call_timeout: self.call_timeout,
        }
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_positive_env(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    let value = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected positive integer)"))?;
    if value == 0 {
        return Err(anyhow!("Invalid {key}: must be greater than zero"));
    }
    Ok(value)
}

fn parse_targets_env(key: &str) -> Result<Vec<NotificationTarget>> {
    match env::var(key) {
        Ok(raw) => parse_targets(&raw).with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(Vec::new()),
    }
}

fn parse_targets(raw: &str) -> Result<Vec<NotificationTarget>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NotificationTarget::parse(s)
                .ok_or_else(|| anyhow!("{s} (expected network/#channel or #channel)"))
        })
        .collect()
}
