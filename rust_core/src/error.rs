//! Error taxonomy for the lobby connection.

use thiserror::Error;

/// Failures surfaced by the RPC transport and the lobby client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    /// Could not establish the transport (refused, unreachable, timed out)
    #[error("failed to connect to lobby server {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// A call was attempted before the version handshake completed
    #[error("connection not ready: handshake has not completed")]
    NotReady,

    /// `list` was attempted before a successful login
    #[error("not authenticated with the lobby server")]
    NotAuthenticated,

    /// The server rejected the login
    #[error("lobby login failed: {0}")]
    AuthenticationFailed(String),

    /// The server answered with an error payload
    #[error("lobby server returned an error: {0}")]
    Rpc(String),

    /// No response arrived within the call bound
    #[error("lobby call '{method}' timed out")]
    Timeout { method: String },

    /// The connection dropped mid-session
    #[error("disconnected from lobby server")]
    Disconnected,

    /// The response could not be decoded into the expected shape
    #[error("malformed lobby response: {0}")]
    MalformedResponse(String),
}

impl LobbyError {
    /// Network-class failure that a later poll may recover from by itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LobbyError::Connect { .. }
                | LobbyError::Timeout { .. }
                | LobbyError::Disconnected
                | LobbyError::Rpc(_)
        )
    }

    /// The session this error came from can no longer be used.
    pub fn drops_session(&self) -> bool {
        matches!(
            self,
            LobbyError::Disconnected | LobbyError::NotReady | LobbyError::Timeout { .. }
        )
    }

    /// Short label for logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            LobbyError::Connect { .. } => "connect",
            LobbyError::NotReady => "not_ready",
            LobbyError::NotAuthenticated => "not_authenticated",
            LobbyError::AuthenticationFailed(_) => "auth_failed",
            LobbyError::Rpc(_) => "rpc",
            LobbyError::Timeout { .. } => "timeout",
            LobbyError::Disconnected => "disconnected",
            LobbyError::MalformedResponse(_) => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(LobbyError::Disconnected.is_transient());
        assert!(LobbyError::Disconnected.drops_session());
        assert!(!LobbyError::NotAuthenticated.is_transient());
        assert!(!LobbyError::NotAuthenticated.drops_session());
        assert!(!LobbyError::AuthenticationFailed("bad".into()).is_transient());
        assert!(LobbyError::Rpc("boom".into()).is_transient());
        assert!(!LobbyError::Rpc("boom".into()).drops_session());
    }

    #[test]
    fn test_display() {
        let err = LobbyError::Timeout {
            method: "list".to_string(),
        };
        assert_eq!(err.to_string(), "lobby call 'list' timed out");
        assert_eq!(err.kind(), "timeout");
    }
}
