//! Host command surface: `games`, `notifications` and `status`

use std::sync::Arc;
use tracing::warn;
use wzlobby_rust_core::models::NotificationTarget;

use crate::health::HealthMonitor;
use crate::query::GamesQuery;
use crate::registry::ChannelRegistry;

pub const USAGE: &str = "Commands: games | notifications <channel> [on|off] | status";
pub const NOT_ALLOWED: &str = "Sorry, you're not allowed to do so.";
const NOTIFICATIONS_USAGE: &str = "Usage: notifications <channel> [on|off]";

/// Who issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub name: String,
    pub is_admin: bool,
}

impl Caller {
    pub fn new(name: impl Into<String>, is_admin: bool) -> Self {
        Self {
            name: name.into(),
            is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Games,
    /// `enable: None` asks for the current flag
    Notifications {
        target: NotificationTarget,
        enable: Option<bool>,
    },
    Status,
    /// Malformed or unknown input, with the reply to give
    Usage(&'static str),
}

impl Command {
    /// Parse one input line; `None` for a blank line
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        let args: Vec<&str> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("games", []) => Self::Games,
            ("status", []) => Self::Status,
            ("notifications", [target]) => match NotificationTarget::parse(target) {
                Some(target) => Self::Notifications {
                    target,
                    enable: None,
                },
                None => Self::Usage(NOTIFICATIONS_USAGE),
            },
            ("notifications", [target, value]) => {
                match (NotificationTarget::parse(target), parse_switch(value)) {
                    (Some(target), Some(enable)) => Self::Notifications {
                        target,
                        enable: Some(enable),
                    },
                    _ => Self::Usage(NOTIFICATIONS_USAGE),
                }
            }
            ("notifications", _) => Self::Usage(NOTIFICATIONS_USAGE),
            _ => Self::Usage(USAGE),
        };
        Some(command)
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "on" | "true" | "yes" | "enable" | "1" => Some(true),
        "off" | "false" | "no" | "disable" | "0" => Some(false),
        _ => None,
    }
}

pub struct CommandHandler {
    query: GamesQuery,
    registry: Arc<ChannelRegistry>,
    health: Arc<HealthMonitor>,
}

impl CommandHandler {
    pub fn new(query: GamesQuery, registry: Arc<ChannelRegistry>, health: Arc<HealthMonitor>) -> Self {
        Self {
            query,
            registry,
            health,
        }
    }

    /// Parse and run one line; `None` for a blank line
    pub fn handle_line(&self, caller: &Caller, line: &str) -> Option<String> {
        Command::parse(line).map(|command| self.execute(caller, command))
    }

    pub fn execute(&self, caller: &Caller, command: Command) -> String {
        match command {
            Command::Games => self.query.current_games_text().to_string(),
            Command::Status => self.health.status_line(),
            Command::Notifications {
                target,
                enable: None,
            } => {
                let state = if self.registry.notify_flag(&target) {
                    "on"
                } else {
                    "off"
                };
                format!("Notifications for {} are {}", target.channel, state)
            }
            Command::Notifications {
                target,
                enable: Some(enable),
            } => {
                if !caller.is_admin {
                    warn!(
                        "{} tried to change notifications for {} without permission",
                        caller.name,
                        target
                    );
                    return NOT_ALLOWED.to_string();
                }
                self.registry.set_notify(&target, enable);
                if enable {
                    format!("Will send notifications to {} in the future", target.channel)
                } else {
                    format!("Will not send notifications to {} in the future", target.channel)
                }
            }
            Command::Usage(reply) => reply.to_string(),
        }
    }
}
