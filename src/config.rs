//! Node configuration.

use crate::relay::zone_relay::{DEFAULT_BACKOFF, DEFAULT_RETRY_LIMIT};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DIFFICULTY: usize = 4;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_ZONE: &str = "local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid shared key: expected 64 hex characters, got {0}")]
    InvalidKey(String),
}

/// Everything a node needs to come up, resolved before anything is spawned.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen_addr: SocketAddr,
    pub seed_peers: Vec<SocketAddr>,
    pub difficulty: usize,
    pub heartbeat_interval: Duration,
    /// Name this node's relay channel is created under.
    pub zone: String,
    pub relay_retry_limit: u32,
    pub relay_backoff: Duration,
    /// Zone-wide symmetric key sealing all peer traffic.
    pub shared_key: [u8; 32],
    pub mine: bool,
}

impl NodeConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            seed_peers: Vec::new(),
            difficulty: DEFAULT_DIFFICULTY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            zone: DEFAULT_ZONE.to_string(),
            relay_retry_limit: DEFAULT_RETRY_LIMIT,
            relay_backoff: DEFAULT_BACKOFF,
            shared_key: [0u8; 32],
            mine: false,
        }
    }

    /// Parses a 64-character hex string into the shared key.
    pub fn parse_shared_key(hex_key: &str) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(hex_key).map_err(|_| ConfigError::InvalidKey(hex_key.into()))?;
        bytes
            .try_into()
            .map_err(|_| ConfigError::InvalidKey(hex_key.into()))
    }
}
