//! Wire envelope for peer gossip.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::network::NetworkError;
use serde::{Deserialize, Serialize};

/// Everything peers say to each other.
///
/// Serialized as a tagged JSON envelope, then encrypted and length-framed by
/// the transport. Unknown tags fail decoding and the sending peer is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// A signed transaction to admit to the pool.
    Transaction(Transaction),
    /// A freshly mined or relayed block.
    Block(Block),
    /// Request for the full chain, answered with `Chain`.
    GetChain,
    /// Full chain snapshot, genesis first.
    Chain(Vec<Block>),
    /// Liveness probe.
    Heartbeat,
    /// Response to `Heartbeat`.
    HeartbeatAck,
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        serde_json::to_vec(self).map_err(|e| NetworkError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        serde_json::from_slice(bytes).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_pair::{Address, PrivateKey};

    #[test]
    fn heartbeat_encodes_with_tag() {
        let bytes = Message::Heartbeat.encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"heartbeat\""));
    }

    #[test]
    fn transaction_envelope_survives_decode() {
        let tx = Transaction::new(Address::zero(), 3, &PrivateKey::new()).unwrap();
        let bytes = Message::Transaction(tx.clone()).encode().unwrap();

        match Message::decode(&bytes).unwrap() {
            Message::Transaction(got) => {
                assert_eq!(got.hash(), tx.hash());
                assert!(got.validate().is_ok());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn chain_envelope_carries_blocks_in_order() {
        let blocks = vec![Block::genesis()];
        let bytes = Message::Chain(blocks).encode().unwrap();

        match Message::decode(&bytes).unwrap() {
            Message::Chain(got) => {
                assert_eq!(got.len(), 1);
                assert_eq!(got[0].index(), 1);
                assert!(got[0].verify_hash());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = br#"{"type":"gossip","payload":null}"#;
        assert!(Message::decode(bytes).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Message::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
