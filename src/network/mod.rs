pub mod message;
pub mod peer;
pub mod server;

use std::net::SocketAddr;
use thiserror::Error;

/// Transport-level failures. Application-level rejections (bad blocks,
/// invalid transactions) never surface here; they are logged and absorbed so
/// one bad peer cannot stall the node.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: SocketAddr, reason: String },

    #[error("failed to send to {addr}: {reason}")]
    Send { addr: SocketAddr, reason: String },

    #[error("failed to decode inbound frame: {0}")]
    Decode(String),
}
