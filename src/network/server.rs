//! Encrypted peer-to-peer transport and message dispatch.

use crate::core::ledger::Ledger;
use crate::core::txpool::TxPool;
use crate::crypto::cipher::WireCipher;
use crate::network::message::Message;
use crate::network::peer::{Peer, MAX_FRAME_LEN};
use crate::network::NetworkError;
use crate::types::hash::Hash;
use crate::{info, warn};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

/// A peer is dropped after this many consecutive heartbeat rounds without an
/// answer.
const MISSED_ROUNDS_LIMIT: u32 = 2;

/// Shared ledger and pool, the node's single source of truth. The ledger sits
/// behind a blocking mutex because every critical section is a short
/// in-memory operation.
pub struct NodeState {
    pub ledger: Mutex<Ledger>,
    pub pool: TxPool,
}

impl NodeState {
    pub fn new(difficulty: usize) -> Self {
        Self {
            ledger: Mutex::new(Ledger::genesis(difficulty)),
            pool: TxPool::new(),
        }
    }
}

/// The node's connection fabric: listener, per-peer read loops, and the
/// heartbeat prober. All frames are sealed with the zone's shared key before
/// hitting the socket.
pub struct PeerNetwork {
    cipher: WireCipher,
    peers: DashMap<SocketAddr, Arc<Peer>>,
    state: Arc<NodeState>,
}

impl PeerNetwork {
    pub fn new(shared_key: &[u8; 32], state: Arc<NodeState>) -> Arc<Self> {
        Arc::new(Self {
            cipher: WireCipher::new(shared_key),
            peers: DashMap::new(),
            state,
        })
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    /// Binds `addr` and spawns the accept loop. Returns the bound address so
    /// callers asking for port 0 learn the real port.
    pub async fn listen(self: &Arc<Self>, addr: SocketAddr) -> Result<SocketAddr, NetworkError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| NetworkError::Bind {
            addr,
            reason: e.to_string(),
        })?;
        let local = listener.local_addr().map_err(|e| NetworkError::Bind {
            addr,
            reason: e.to_string(),
        })?;
        info!("listening on {local}");

        let network = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        info!("accepted peer {peer_addr}");
                        network.register(stream, peer_addr);
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });
        Ok(local)
    }

    /// Dials a remote peer and registers the connection.
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) -> Result<(), NetworkError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| NetworkError::Connect {
                addr,
                reason: e.to_string(),
            })?;
        info!("connected to peer {addr}");
        self.register(stream, addr);
        Ok(())
    }

    fn register(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let (read_half, write_half) = stream.into_split();
        let peer = Arc::new(Peer::new(addr, write_half));
        self.peers.insert(addr, peer);

        let network = Arc::clone(self);
        tokio::spawn(async move {
            network.read_loop(read_half, addr).await;
            network.drop_peer(addr, "connection closed");
        });
    }

    fn drop_peer(&self, addr: SocketAddr, reason: &str) {
        if self.peers.remove(&addr).is_some() {
            warn!("dropping peer {addr}: {reason}");
        }
    }

    /// Seals and sends one message to one peer. A send failure evicts the
    /// peer; the connection is assumed dead.
    pub async fn send(&self, addr: SocketAddr, message: &Message) -> Result<(), NetworkError> {
        let peer = match self.peers.get(&addr) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                return Err(NetworkError::Send {
                    addr,
                    reason: "unknown peer".into(),
                })
            }
        };

        let sealed = self
            .cipher
            .seal(&message.encode()?)
            .map_err(|e| NetworkError::Send {
                addr,
                reason: e.to_string(),
            })?;
        if let Err(e) = peer.send_frame(&sealed).await {
            self.drop_peer(addr, "send failed");
            return Err(e);
        }
        Ok(())
    }

    /// Sends to every connected peer. Per-peer failures are logged and the
    /// broadcast continues; delivery is best-effort.
    pub async fn broadcast(&self, message: &Message) {
        for addr in self.peer_addrs() {
            if let Err(e) = self.send(addr, message).await {
                warn!("broadcast skipped a peer: {e}");
            }
        }
    }

    async fn read_loop(&self, mut reader: OwnedReadHalf, addr: SocketAddr) {
        loop {
            let mut len_buf = [0u8; 4];
            if reader.read_exact(&mut len_buf).await.is_err() {
                return;
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                warn!("peer {addr} announced oversized frame of {len} bytes");
                return;
            }

            let mut payload = vec![0u8; len];
            if reader.read_exact(&mut payload).await.is_err() {
                return;
            }

            let plain = match self.cipher.open(&payload) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!("peer {addr} sent undecryptable frame: {e}");
                    return;
                }
            };
            let message = match Message::decode(&plain) {
                Ok(message) => message,
                Err(e) => {
                    warn!("peer {addr} sent malformed message: {e}");
                    return;
                }
            };

            self.handle(addr, message).await;
        }
    }

    async fn handle(&self, from: SocketAddr, message: Message) {
        match message {
            Message::Transaction(tx) => {
                if self.state.pool.add(tx) {
                    info!("admitted transaction from {from}");
                }
            }
            Message::Block(block) => {
                let confirmed: Vec<Hash> =
                    block.transactions().iter().map(|tx| tx.hash()).collect();
                let outcome = self.state.ledger.lock().unwrap().ingest(block);
                match outcome {
                    Ok(()) => self.state.pool.remove_batch(&confirmed),
                    Err(e) => {
                        // We may be behind; ask the sender for its chain.
                        warn!("block from {from} rejected: {e}");
                        let _ = self.send(from, &Message::GetChain).await;
                    }
                }
            }
            Message::GetChain => {
                let blocks = self.state.ledger.lock().unwrap().blocks().to_vec();
                let _ = self.send(from, &Message::Chain(blocks)).await;
            }
            Message::Chain(blocks) => {
                let confirmed: Vec<Hash> = blocks
                    .iter()
                    .flat_map(|b| b.transactions().iter().map(|tx| tx.hash()))
                    .collect();
                let adopted = self.state.ledger.lock().unwrap().try_adopt(blocks);
                if adopted {
                    self.state.pool.remove_batch(&confirmed);
                }
            }
            Message::Heartbeat => {
                let _ = self.send(from, &Message::HeartbeatAck).await;
            }
            Message::HeartbeatAck => {
                if let Some(peer) = self.peers.get(&from) {
                    peer.mark_alive();
                }
            }
        }
    }

    /// Runs one heartbeat round: evict peers that stayed silent for
    /// [`MISSED_ROUNDS_LIMIT`] consecutive rounds, then probe the rest.
    pub async fn run_heartbeat_round(&self) {
        let mut evict = Vec::new();
        for entry in self.peers.iter() {
            let peer = entry.value();
            if peer.begin_round() >= MISSED_ROUNDS_LIMIT {
                evict.push(peer.addr());
            }
        }
        for addr in evict {
            self.drop_peer(addr, "missed heartbeats");
        }

        for addr in self.peer_addrs() {
            let _ = self.send(addr, &Message::Heartbeat).await;
        }
    }

    /// Spawns the periodic heartbeat prober.
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) {
        let network = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                network.run_heartbeat_round().await;
            }
        });
    }
}
