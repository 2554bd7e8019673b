// Shared models for the lobby services
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when deriving a game's fingerprint key
pub const KEY_SEPARATOR: char = '&';

// ============================================================================
// Lobby Games
// ============================================================================

/// One open game as reported by the lobby server's `list` call.
///
/// Every field is required on the wire; a record missing any of them fails
/// deserialization and the whole response is treated as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub description: String,
    #[serde(rename = "mapname")]
    pub map_name: String,
    #[serde(rename = "hostplayer")]
    pub host_player: String,
    #[serde(rename = "currentPlayers")]
    pub current_players: u32,
    #[serde(rename = "maxPlayers")]
    pub max_players: u32,
    #[serde(rename = "isPrivate")]
    pub is_private: bool,
    #[serde(rename = "multiVer")]
    pub multi_version: String,
}

impl Game {
    /// Key identifying this game for change detection.
    ///
    /// Only description, map and host take part; player counts, privacy and
    /// version changes never alter the key.
    pub fn fingerprint_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.description,
            self.map_name,
            self.host_player,
            sep = KEY_SEPARATOR
        )
    }
}

/// The game list produced by one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListSnapshot {
    games: Vec<Game>,
    taken_at: DateTime<Utc>,
}

impl GameListSnapshot {
    pub fn new(games: Vec<Game>) -> Self {
        Self {
            games,
            taken_at: Utc::now(),
        }
    }

    /// The "no data yet" baseline
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

// ============================================================================
// Notification Targets
// ============================================================================

pub const DEFAULT_NETWORK: &str = "default";

/// A destination for lobby notifications, e.g. a channel on a chat network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub network: String,
    pub channel: String,
}

impl NotificationTarget {
    pub fn new(network: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
        }
    }

    /// Parse `network/#channel`; a bare `#channel` lands on the default network.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (network, channel) = match raw.split_once('/') {
            Some((network, channel)) => (network.trim(), channel.trim()),
            None => (DEFAULT_NETWORK, raw),
        };
        if network.is_empty() || channel.is_empty() {
            return None;
        }
        Some(Self::new(network, channel))
    }
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_decodes_wire_field_names() {
        let raw = serde_json::json!({
            "description": "One v One",
            "mapname": "2c-Startup",
            "hostplayer": "Alice",
            "currentPlayers": 1,
            "maxPlayers": 2,
            "isPrivate": false,
            "multiVer": "4.0.1"
        });

        let game: Game = serde_json::from_value(raw).unwrap();
        assert_eq!(game.map_name, "2c-Startup");
        assert_eq!(game.host_player, "Alice");
        assert_eq!(game.current_players, 1);
        assert_eq!(game.multi_version, "4.0.1");
    }

    #[test]
    fn test_game_missing_field_is_rejected() {
        let raw = serde_json::json!({
            "description": "One v One",
            "mapname": "2c-Startup",
            "hostplayer": "Alice",
            "currentPlayers": 1,
            "maxPlayers": 2,
            "isPrivate": false
        });

        assert!(serde_json::from_value::<Game>(raw).is_err());
    }

    #[test]
    fn test_fingerprint_key_ignores_counts() {
        let game = Game {
            description: "desc".to_string(),
            map_name: "map".to_string(),
            host_player: "host".to_string(),
            current_players: 1,
            max_players: 4,
            is_private: false,
            multi_version: "4.0".to_string(),
        };
        let mut fuller = game.clone();
        fuller.current_players = 3;
        fuller.is_private = true;

        assert_eq!(game.fingerprint_key(), "desc&map&host");
        assert_eq!(game.fingerprint_key(), fuller.fingerprint_key());
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(
            NotificationTarget::parse("freenode/#warzone2100"),
            Some(NotificationTarget::new("freenode", "#warzone2100"))
        );
        assert_eq!(
            NotificationTarget::parse(" #wz "),
            Some(NotificationTarget::new(DEFAULT_NETWORK, "#wz"))
        );
        assert_eq!(NotificationTarget::parse("freenode/"), None);
        assert_eq!(NotificationTarget::parse(""), None);
    }
}
