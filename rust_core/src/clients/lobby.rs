use crate::error::LobbyError;
use crate::models::Game;
use crate::rpc::RpcConnection;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Login credentials for the lobby server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the lobby server
#[derive(Debug, Clone)]
pub struct LobbyConnectionConfig {
    pub address: String,
    pub port: u16,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

/// One authenticated-or-not session with the lobby server
#[async_trait]
pub trait LobbyApi: Send + Sync {
    /// Authenticate this session. Issued once, right after the handshake.
    async fn login(&self) -> Result<(), LobbyError>;

    /// Fetch the currently open games.
    async fn list_games(&self) -> Result<Vec<Game>, LobbyError>;

    fn is_authenticated(&self) -> bool;

    /// True once the connection is gone; the session cannot be reused.
    fn is_closed(&self) -> bool;

    /// Close the underlying connection. Safe to call more than once.
    async fn close(&self);
}

/// Opens lobby sessions; the poll scheduler owns reconnect decisions.
#[async_trait]
pub trait LobbyConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn LobbyApi>, LobbyError>;

    /// Address for logging
    fn endpoint(&self) -> String;
}

/// Lobby client over the framed RPC transport
pub struct LobbyClient {
    conn: RpcConnection,
    credentials: Credentials,
    call_timeout: Duration,
    authenticated: AtomicBool,
}

impl std::fmt::Debug for LobbyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyClient")
            .field("peer", &self.conn.peer())
            .field("user", &self.credentials.username)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl LobbyClient {
    /// Connect and complete the version handshake. Login is a separate step.
    pub async fn connect(config: &LobbyConnectionConfig) -> Result<Self, LobbyError> {
        let conn =
            RpcConnection::connect(&config.address, config.port, config.connect_timeout).await?;
        Ok(Self::with_connection(
            conn,
            config.credentials.clone(),
            config.call_timeout,
        ))
    }

    /// Build a client on an existing connection
    pub fn with_connection(
        conn: RpcConnection,
        credentials: Credentials,
        call_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            credentials,
            call_timeout,
            authenticated: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LobbyApi for LobbyClient {
    async fn login(&self) -> Result<(), LobbyError> {
        if self.conn.is_closed() {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(LobbyError::Disconnected);
        }

        let mut kwargs = Map::new();
        kwargs.insert(
            "username".to_string(),
            Value::String(self.credentials.username.clone()),
        );
        kwargs.insert(
            "password".to_string(),
            Value::String(self.credentials.password.clone()),
        );

        let result = match self.conn.call("login", kwargs, self.call_timeout).await {
            Ok(result) => result,
            Err(LobbyError::Rpc(reason)) => {
                self.authenticated.store(false, Ordering::SeqCst);
                return Err(LobbyError::AuthenticationFailed(reason));
            }
            Err(e) => return Err(e),
        };

        if result == Value::Bool(false) {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(LobbyError::AuthenticationFailed(
                "server rejected credentials".to_string(),
            ));
        }

        self.authenticated.store(true, Ordering::SeqCst);
        info!(
            "Logged in to lobby server {} as {}",
            self.conn.peer(),
            self.credentials.username
        );
        Ok(())
    }

    async fn list_games(&self) -> Result<Vec<Game>, LobbyError> {
        // A lost connection is a network failure, not a login problem
        if self.conn.is_closed() {
            return Err(LobbyError::Disconnected);
        }
        if !self.is_authenticated() {
            return Err(LobbyError::NotAuthenticated);
        }

        let result = self.conn.call("list", Map::new(), self.call_timeout).await?;
        let games: Vec<Game> = serde_json::from_value(result).map_err(|e| {
            warn!("Lobby server {} sent an unreadable game list: {}", self.conn.peer(), e);
            LobbyError::MalformedResponse(e.to_string())
        })?;

        debug!("Lobby server {} lists {} games", self.conn.peer(), games.len());
        Ok(games)
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst) && !self.conn.is_closed()
    }

    fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    async fn close(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.conn.close().await;
    }
}

/// Connects to the lobby server over TCP
#[derive(Debug, Clone)]
pub struct TcpLobbyConnector {
    config: LobbyConnectionConfig,
}

impl TcpLobbyConnector {
    pub fn new(config: LobbyConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LobbyConnector for TcpLobbyConnector {
    async fn connect(&self) -> Result<Arc<dyn LobbyApi>, LobbyError> {
        let client = LobbyClient::connect(&self.config).await?;
        Ok(Arc::new(client))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.address, self.config.port)
    }
}
