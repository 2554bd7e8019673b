//! Change detection for lobby game lists
//!
//! A game list is reduced to a fingerprint: the set of
//! `description&map&host` keys of its games. Two lists are equivalent when
//! their fingerprints are equal; anything in the symmetric difference counts
//! as a change, so both new and vanished games are reported.

use crate::models::{Game, GameListSnapshot};
use std::collections::HashSet;
use std::sync::Arc;

/// Order-independent key set derived from a game list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    keys: HashSet<String>,
}

impl Fingerprint {
    pub fn from_games(games: &[Game]) -> Self {
        Self {
            keys: games.iter().map(Game::fingerprint_key).collect(),
        }
    }

    /// True when some key is present in exactly one of the two fingerprints
    pub fn differs_from(&self, other: &Fingerprint) -> bool {
        self.keys.symmetric_difference(&other.keys).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Result of feeding a new game list to the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    Unchanged,
    Changed {
        previous: Arc<GameListSnapshot>,
        current: Arc<GameListSnapshot>,
    },
}

impl ChangeOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeOutcome::Changed { .. })
    }
}

/// Holds the last announced snapshot and its fingerprint.
///
/// Starts from the empty list, so the first poll that returns any game is a
/// change and a first poll with no games is not.
#[derive(Debug)]
pub struct ChangeDetector {
    snapshot: Arc<GameListSnapshot>,
    fingerprint: Fingerprint,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(GameListSnapshot::empty()),
            fingerprint: Fingerprint::default(),
        }
    }

    /// Compare `games` with the stored state, replacing it on change.
    pub fn update(&mut self, games: Vec<Game>) -> ChangeOutcome {
        let fingerprint = Fingerprint::from_games(&games);
        if !fingerprint.differs_from(&self.fingerprint) {
            return ChangeOutcome::Unchanged;
        }

        let current = Arc::new(GameListSnapshot::new(games));
        let previous = std::mem::replace(&mut self.snapshot, current.clone());
        self.fingerprint = fingerprint;

        ChangeOutcome::Changed { previous, current }
    }

    pub fn snapshot(&self) -> Arc<GameListSnapshot> {
        self.snapshot.clone()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
