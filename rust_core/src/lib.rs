//! WZLobby Core - lobby server connection and change detection.
//!
//! This module provides:
//! - Lobby game and notification target models
//! - Version handshake and length-prefixed JSON framing
//! - Request/response RPC transport with id-correlated replies
//! - Lobby client with login state (`login`, `list`)
//! - Fingerprint based change detection for game lists

pub mod clients;
pub mod detector;
pub mod error;
pub mod models;
pub mod rpc;

pub use detector::{ChangeDetector, ChangeOutcome, Fingerprint};
pub use error::LobbyError;
pub use models::{Game, GameListSnapshot, NotificationTarget};
