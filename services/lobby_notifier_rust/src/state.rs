//! Shared lobby state: the change detector plus the message it implies.
//!
//! Every update runs under one lock, so the snapshot, its fingerprint and
//! the cached text always describe the same game list.

use parking_lot::Mutex;
use std::sync::Arc;
use wzlobby_rust_core::models::{Game, GameListSnapshot};
use wzlobby_rust_core::{ChangeDetector, ChangeOutcome};

use crate::formatters;

/// A change worth announcing
#[derive(Debug, Clone)]
pub struct LobbyChange {
    pub previous: Arc<GameListSnapshot>,
    pub current: Arc<GameListSnapshot>,
    pub message: Arc<str>,
}

struct Inner {
    detector: ChangeDetector,
    message: Arc<str>,
}

pub struct LobbyState {
    inner: Mutex<Inner>,
}

impl Default for LobbyState {
    fn default() -> Self {
        Self::new()
    }
}

impl LobbyState {
    pub fn new() -> Self {
        let detector = ChangeDetector::new();
        let message = formatters::format_games(detector.snapshot().games()).into();
        Self {
            inner: Mutex::new(Inner { detector, message }),
        }
    }

    /// Feed a fresh poll result. Returns the change to announce, if any.
    pub fn apply(&self, games: Vec<Game>) -> Option<LobbyChange> {
        let mut inner = self.inner.lock();
        match inner.detector.update(games) {
            ChangeOutcome::Unchanged => None,
            ChangeOutcome::Changed { previous, current } => {
                let message: Arc<str> = formatters::format_games(current.games()).into();
                inner.message = message.clone();
                Some(LobbyChange {
                    previous,
                    current,
                    message,
                })
            }
        }
    }

    /// Formatted text of the last announced game list
    pub fn message(&self) -> Arc<str> {
        self.inner.lock().message.clone()
    }

    pub fn snapshot(&self) -> Arc<GameListSnapshot> {
        self.inner.lock().detector.snapshot()
    }
}
