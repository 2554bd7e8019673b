pub mod lobby;

// Re-export commonly used types
pub use lobby::{
    Credentials, LobbyApi, LobbyClient, LobbyConnectionConfig, LobbyConnector, TcpLobbyConnector,
};
