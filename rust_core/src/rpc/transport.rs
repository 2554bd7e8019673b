//! Request/response RPC over a single lobby connection.
//!
//! Calls are tagged with an id and written as framed JSON; a background
//! reader task routes each response to the waiting caller by that id, so
//! replies may arrive in any order. The transport never reconnects on its
//! own: once the peer goes away every pending and future call fails with
//! `Disconnected` and the owner decides what to do next.

use crate::error::LobbyError;
use crate::rpc::framing::{self, Handshake, RpcRequest, RpcResponse};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, LobbyError>>>>>;

/// One connection to the lobby RPC service
pub struct RpcConnection {
    peer: String,
    ready: AtomicBool,
    handshaking: AtomicBool,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    pending: PendingCalls,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    /// Read half parked until the handshake hands it to the reader task
    reader: Mutex<Option<BoxedReader>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    /// Connect over TCP and complete the version handshake.
    pub async fn connect(
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, LobbyError> {
        let addr = format!("{}:{}", address, port);

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(LobbyError::Connect {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(LobbyError::Connect {
                    addr,
                    reason: format!("timed out after {:?}", connect_timeout),
                })
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }

        let conn = Self::from_stream(stream, addr.clone());
        conn.handshake().await.map_err(|e| LobbyError::Connect {
            addr: addr.clone(),
            reason: format!("handshake failed: {}", e),
        })?;

        info!("Connected to lobby server {}", addr);
        Ok(conn)
    }

    /// Wrap an open stream. No call is accepted until [`handshake`](Self::handshake) succeeds.
    pub fn from_stream<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            peer: peer.into(),
            ready: AtomicBool::new(false),
            handshaking: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            writer: tokio::sync::Mutex::new(Some(Box::new(write_half))),
            reader: Mutex::new(Some(Box::new(read_half))),
            reader_task: Mutex::new(None),
        }
    }

    /// Send the version handshake and start routing responses.
    ///
    /// A caller that races an unfinished handshake gets `NotReady` and
    /// writes nothing.
    pub async fn handshake(&self) -> Result<(), LobbyError> {
        if self.ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self
            .handshaking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LobbyError::NotReady);
        }

        let outcome = self.start().await;
        self.handshaking.store(false, Ordering::Release);
        outcome
    }

    async fn start(&self) -> Result<(), LobbyError> {
        {
            let mut writer = self.writer.lock().await;
            let w = writer.as_mut().ok_or(LobbyError::Disconnected)?;
            if let Err(e) = Handshake::default().write_to(w).await {
                warn!("Failed to write handshake to {}: {}", self.peer, e);
                self.closed.store(true, Ordering::SeqCst);
                return Err(LobbyError::Disconnected);
            }
        }

        let reader = self.reader.lock().take().ok_or(LobbyError::Disconnected)?;
        let task = tokio::spawn(read_loop(
            reader,
            self.pending.clone(),
            self.closed.clone(),
            self.peer.clone(),
        ));
        *self.reader_task.lock() = Some(task);

        self.ready.store(true, Ordering::SeqCst);
        debug!("Handshake complete with {}", self.peer);
        Ok(())
    }

    /// Issue `method` with keyword arguments and wait up to `timeout` for its reply.
    pub async fn call(
        &self,
        method: &str,
        kwargs: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, LobbyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LobbyError::Disconnected);
        }
        if !self.ready.load(Ordering::SeqCst) {
            return Err(LobbyError::NotReady);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        // The reader marks the connection closed before draining pending calls,
        // so an insert that lost that race is caught here.
        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(LobbyError::Disconnected);
        }

        let request = RpcRequest {
            id,
            method: method.to_string(),
            kwargs,
        };

        {
            let mut writer = self.writer.lock().await;
            let Some(w) = writer.as_mut() else {
                self.pending.lock().remove(&id);
                return Err(LobbyError::Disconnected);
            };
            if let Err(e) = framing::write_frame(w, &request).await {
                warn!("Failed to send '{}' to {}: {}", method, self.peer, e);
                self.pending.lock().remove(&id);
                self.closed.store(true, Ordering::SeqCst);
                return Err(LobbyError::Disconnected);
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(LobbyError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(LobbyError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Number of calls still waiting for a reply
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    /// Tear the connection down. Pending calls resolve to `Disconnected`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.reader.lock().take();

        let writer = self.writer.lock().await.take();
        if let Some(mut w) = writer {
            if let Err(e) = w.shutdown().await {
                debug!("Error shutting down connection to {}: {}", self.peer, e);
            }
            info!("Closed lobby connection to {}", self.peer);
        }

        fail_pending(&self.pending, LobbyError::Disconnected);
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
    }
}

/// Background task: read frames until the peer goes away.
async fn read_loop(
    mut reader: BoxedReader,
    pending: PendingCalls,
    closed: Arc<AtomicBool>,
    peer: String,
) {
    loop {
        let payload = match framing::read_frame_bytes(&mut reader).await {
            Ok(payload) => payload,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    info!("Lobby server {} closed the connection", peer);
                } else {
                    warn!("Lobby connection to {} failed: {}", peer, e);
                }
                break;
            }
        };

        let response: RpcResponse = match framing::decode_frame(&payload) {
            Ok(response) => response,
            Err(e) => {
                // Without a readable id the stream cannot be trusted any more
                warn!("Undecodable frame from {}, closing connection: {}", peer, e);
                fail_pending(&pending, LobbyError::MalformedResponse(e.to_string()));
                break;
            }
        };

        let Some(tx) = pending.lock().remove(&response.id) else {
            debug!("Discarding response for unknown call id {}", response.id);
            continue;
        };

        let outcome = match (response.error, response.result) {
            (Some(error), _) => Err(LobbyError::Rpc(error_message(&error))),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        // The caller may have timed out already
        let _ = tx.send(outcome);
    }

    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending, LobbyError::Disconnected);
}

fn fail_pending(pending: &PendingCalls, error: LobbyError) {
    let drained: Vec<_> = pending.lock().drain().map(|(_, tx)| tx).collect();
    for tx in drained {
        let _ = tx.send(Err(error.clone()));
    }
}

/// Human-readable text of a server error payload.
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}
