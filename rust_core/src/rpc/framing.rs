//! Wire framing for the lobby RPC protocol.
//!
//! A connection opens with a fixed 12-byte version handshake:
//! `[8-byte method tag "version", zero padded][u32 protocol version (big-endian)]`.
//! After that every message is `[u32 length (big-endian)][JSON payload]`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version announced during the handshake
pub const PROTOCOL_VERSION: u32 = 4;

/// Method tag sent first on every connection
pub const HANDSHAKE_TAG: &[u8] = b"version";

const TAG_LEN: usize = 8;
pub const HANDSHAKE_LEN: usize = TAG_LEN + 4;

/// Reject frames larger than 16 MiB
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// The version handshake written before any RPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub version: u32,
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
        }
    }
}

impl Handshake {
    pub fn encode(&self) -> [u8; HANDSHAKE_LEN] {
        let mut buf = [0u8; HANDSHAKE_LEN];
        buf[..HANDSHAKE_TAG.len()].copy_from_slice(HANDSHAKE_TAG);
        buf[TAG_LEN..].copy_from_slice(&self.version.to_be_bytes());
        buf
    }

    /// Decode a handshake, returning `None` if the method tag is not `version`.
    pub fn decode(buf: &[u8; HANDSHAKE_LEN]) -> Option<Self> {
        let tag = &buf[..TAG_LEN];
        let name_len = tag.iter().position(|b| *b == 0).unwrap_or(TAG_LEN);
        if &tag[..name_len] != HANDSHAKE_TAG || tag[name_len..].iter().any(|b| *b != 0) {
            return None;
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&buf[TAG_LEN..]);
        Some(Self {
            version: u32::from_be_bytes(version),
        })
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode()).await?;
        writer.flush().await
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HANDSHAKE_LEN];
        reader.read_exact(&mut buf).await?;
        Self::decode(&buf)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid version handshake"))
    }
}

/// An outgoing call: method name plus keyword arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

/// A reply to the request with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: impl Into<serde_json::Value>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Write a length-prefixed JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload =
        serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", payload.len()),
        ));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Read a length-prefixed JSON frame.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame_bytes(reader).await?;
    decode_frame(&payload)
}

/// Decode a frame payload read with [`read_frame_bytes`].
pub fn decode_frame<T: DeserializeOwned>(payload: &[u8]) -> io::Result<T> {
    serde_json::from_slice(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read one frame's raw payload without decoding it.
///
/// A payload that later fails to decode leaves the stream aligned on the next
/// frame; an error from this function does not.
pub async fn read_frame_bytes<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}
