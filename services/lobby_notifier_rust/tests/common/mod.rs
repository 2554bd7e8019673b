#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use lobby_notifier_rust::MessageSink;
use wzlobby_rust_core::clients::{Credentials, LobbyConnectionConfig};
use wzlobby_rust_core::models::{Game, NotificationTarget};
use wzlobby_rust_core::rpc::framing::{self, Handshake, RpcRequest, RpcResponse};

pub const USER: &str = "notifier";
pub const PASSWORD: &str = "hunter2";

/// What the fake server does with one `list` call
#[derive(Debug, Clone)]
pub enum ListReply {
    Games(Vec<Game>),
    /// Answer, then close the connection
    GamesThenClose(Vec<Game>),
    Error(String),
    /// Close the connection without answering
    Hangup,
}

#[derive(Default)]
struct Script {
    replies: Mutex<VecDeque<ListReply>>,
    connections: AtomicU32,
    logins: AtomicU32,
    list_calls: AtomicU32,
}

/// In-process lobby server speaking the length-prefixed JSON protocol
pub struct FakeLobby {
    pub addr: SocketAddr,
    script: Arc<Script>,
    task: JoinHandle<()>,
}

impl FakeLobby {
    /// Serve scripted `list` replies; an empty list once the script runs out
    pub async fn start(replies: Vec<ListReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Script {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        });

        let accept_script = script.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_script.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, accept_script.clone()));
            }
        });

        Self { addr, script, task }
    }

    pub fn config(&self, password: &str) -> LobbyConnectionConfig {
        LobbyConnectionConfig {
            address: self.addr.ip().to_string(),
            port: self.addr.port(),
            credentials: Credentials {
                username: USER.to_string(),
                password: password.to_string(),
            },
            connect_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_secs(2),
        }
    }

    pub fn connections(&self) -> u32 {
        self.script.connections.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> u32 {
        self.script.logins.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> u32 {
        self.script.list_calls.load(Ordering::SeqCst)
    }
}

impl Drop for FakeLobby {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, script: Arc<Script>) {
    let handshake = Handshake::read_from(&mut socket).await.unwrap();
    assert_eq!(handshake.version, 4);

    loop {
        let request: RpcRequest = match framing::read_frame(&mut socket).await {
            Ok(request) => request,
            Err(_) => return,
        };

        let mut close_after = false;
        let response = match request.method.as_str() {
            "login" => {
                script.logins.fetch_add(1, Ordering::SeqCst);
                let valid = request.kwargs.get("username") == Some(&Value::from(USER))
                    && request.kwargs.get("password") == Some(&Value::from(PASSWORD));
                if valid {
                    RpcResponse::ok(request.id, Value::Bool(true))
                } else {
                    RpcResponse::err(request.id, "invalid credentials")
                }
            }
            "list" => {
                script.list_calls.fetch_add(1, Ordering::SeqCst);
                let reply = script
                    .replies
                    .lock()
                    .pop_front()
                    .unwrap_or(ListReply::Games(Vec::new()));
                match reply {
                    ListReply::Games(games) => {
                        RpcResponse::ok(request.id, serde_json::to_value(games).unwrap())
                    }
                    ListReply::GamesThenClose(games) => {
                        close_after = true;
                        RpcResponse::ok(request.id, serde_json::to_value(games).unwrap())
                    }
                    ListReply::Error(message) => RpcResponse::err(request.id, message),
                    ListReply::Hangup => return,
                }
            }
            other => RpcResponse::err(request.id, format!("unknown method {other}")),
        };

        if framing::write_frame(&mut socket, &response).await.is_err() || close_after {
            return;
        }
    }
}

pub fn game(description: &str, map: &str, host: &str) -> Game {
    Game {
        description: description.to_string(),
        map_name: map.to_string(),
        host_player: host.to_string(),
        current_players: 1,
        max_players: 4,
        is_private: false,
        multi_version: "4.3.5".to_string(),
    }
}

/// Sink that remembers every delivery
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(NotificationTarget, String)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(NotificationTarget, String)> {
        self.sent.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&self, target: &NotificationTarget, message: &str) -> Result<()> {
        self.sent.lock().push((target.clone(), message.to_string()));
        Ok(())
    }
}
