pub mod framing;
pub mod transport;

pub use framing::{Handshake, PROTOCOL_VERSION};
pub use transport::RpcConnection;
