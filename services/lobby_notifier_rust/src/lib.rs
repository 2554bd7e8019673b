//! Lobby notifier service
//!
//! Polls the lobby server, detects changes to the open game list, and
//! announces them to subscribed channels. Also answers `games`,
//! `notifications` and `status` commands from the host.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod formatters;
pub mod health;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod webhook_client;

pub use commands::{Caller, Command, CommandHandler};
pub use dispatcher::{DispatchReport, MessageSink, NotificationDispatcher, TargetDirectory};
pub use health::{HealthMonitor, LobbyHealth};
pub use query::GamesQuery;
pub use registry::ChannelRegistry;
pub use scheduler::{LobbyPoller, PollerSettings};
pub use state::LobbyState;
