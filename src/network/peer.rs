//! Per-peer connection state and framed writes.

use crate::network::NetworkError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Upper bound on a single frame's payload. Anything larger is treated as a
/// protocol violation and the connection is dropped.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One live connection. The read half lives in the peer's read loop; the
/// write half sits here behind an async mutex so concurrent sends stay
/// frame-atomic.
pub struct Peer {
    addr: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    alive: AtomicBool,
    missed_rounds: AtomicU32,
}

impl Peer {
    pub fn new(addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            addr,
            writer: Mutex::new(writer),
            alive: AtomicBool::new(true),
            missed_rounds: AtomicU32::new(0),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Writes one frame: u32 LE payload length, then the payload.
    pub async fn send_frame(&self, payload: &[u8]) -> Result<(), NetworkError> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(NetworkError::Send {
                addr: self.addr,
                reason: format!("frame of {} bytes exceeds cap", payload.len()),
            });
        }

        let mut writer = self.writer.lock().await;
        let len = (payload.len() as u32).to_le_bytes();
        writer.write_all(&len).await.map_err(|e| NetworkError::Send {
            addr: self.addr,
            reason: e.to_string(),
        })?;
        writer
            .write_all(payload)
            .await
            .map_err(|e| NetworkError::Send {
                addr: self.addr,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Marks the peer as having answered since the last heartbeat round.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
        self.missed_rounds.store(0, Ordering::Release);
    }

    /// Called once per heartbeat round before probing. Returns the number of
    /// consecutive rounds this peer has failed to answer.
    pub fn begin_round(&self) -> u32 {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.missed_rounds.store(0, Ordering::Release);
            0
        } else {
            self.missed_rounds.fetch_add(1, Ordering::AcqRel) + 1
        }
    }
}
