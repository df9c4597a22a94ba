//! Hash-chained blocks.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One block in the chain: a snapshot of the pool committed under a
/// proof-of-work nonce.
///
/// Fields are private and fixed at construction, then the content hash is
/// taken over them; blocks are append-only and never mutated afterwards.
/// Deserialized blocks carry a claimed hash that must be re-checked with
/// [`verify_hash`](Block::verify_hash) before the block is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    previous_hash: Hash,
    timestamp: u64,
    transactions: Vec<Transaction>,
    nonce: u64,
    hash: Hash,
}

impl Block {
    /// Creates a block and seals it with its content hash.
    ///
    /// The timestamp is taken here, before hashing, so every hashed field is
    /// fixed when the hash is computed.
    pub fn new(
        index: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        nonce: u64,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let hash = Self::compute_hash(index, &previous_hash, timestamp, &transactions, nonce);
        Self {
            index,
            previous_hash,
            timestamp,
            transactions,
            nonce,
            hash,
        }
    }

    /// Builds the genesis block: index 1, zero previous hash, no
    /// transactions, nonce 0.
    pub fn genesis() -> Self {
        Self::new(1, Hash::zero(), Vec::new(), 0)
    }

    /// Block height; the genesis block is index 1.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Hash of the preceding block ([`Hash::zero`] for genesis).
    pub fn previous_hash(&self) -> Hash {
        self.previous_hash
    }

    /// Creation time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Transactions committed by this block.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Proof-of-work nonce found by the miner.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Content hash sealed at construction.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Recomputes the content hash and compares it to the sealed one.
    ///
    /// Fails for blocks whose wire record was tampered with in transit.
    pub fn verify_hash(&self) -> bool {
        self.hash
            == Self::compute_hash(
                self.index,
                &self.previous_hash,
                self.timestamp,
                &self.transactions,
                self.nonce,
            )
    }

    /// Domain-separated hash over all block fields except the hash itself.
    ///
    /// Transactions contribute through their own content hashes, keeping the
    /// computation independent of the wire encoding.
    fn compute_hash(
        index: u64,
        previous_hash: &Hash,
        timestamp: u64,
        transactions: &[Transaction],
        nonce: u64,
    ) -> Hash {
        let mut h = Hash::sha3();
        h.update(b"ZONE_BLOCK");
        h.update(&index.to_le_bytes());
        h.update(previous_hash.as_slice());
        h.update(&timestamp.to_le_bytes());
        for tx in transactions {
            h.update(tx.hash().as_slice());
        }
        h.update(&nonce.to_le_bytes());
        h.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_pair::{Address, PrivateKey};

    fn new_tx(amount: u64) -> Transaction {
        Transaction::new(Address::zero(), amount, &PrivateKey::new()).unwrap()
    }

    #[test]
    fn genesis_has_fixed_shape() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index(), 1);
        assert_eq!(genesis.previous_hash(), Hash::zero());
        assert!(genesis.transactions().is_empty());
        assert_eq!(genesis.nonce(), 0);
        assert!(genesis.verify_hash());
    }

    #[test]
    fn hash_covers_all_fields() {
        let tx = new_tx(5);
        let parent = Hash::sha3().chain(b"parent").finalize();

        let block = Block::new(2, parent, vec![tx.clone()], 42);
        let different_nonce = Block::new(2, parent, vec![tx.clone()], 43);
        let different_index = Block::new(3, parent, vec![tx], 42);

        assert_ne!(block.hash(), different_nonce.hash());
        assert_ne!(block.hash(), different_index.hash());
    }

    #[test]
    fn verify_hash_accepts_untouched_block() {
        let block = Block::new(2, Hash::zero(), vec![new_tx(1)], 7);
        assert!(block.verify_hash());
    }

    #[test]
    fn verify_hash_rejects_tampered_record() {
        let block = Block::new(2, Hash::zero(), vec![new_tx(1)], 7);

        let mut value = serde_json::to_value(&block).unwrap();
        value["nonce"] = serde_json::json!(8);
        let tampered: Block = serde_json::from_value(value).unwrap();

        assert!(!tampered.verify_hash());
    }

    #[test]
    fn serde_roundtrip_preserves_hash() {
        let block = Block::new(2, Hash::zero(), vec![new_tx(3), new_tx(4)], 11);
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();

        assert_eq!(back, block);
        assert!(back.verify_hash());
    }

    #[test]
    fn record_carries_external_field_names() {
        let block = Block::genesis();
        let value: serde_json::Value = serde_json::to_value(&block).unwrap();
        for field in [
            "index",
            "previous_hash",
            "timestamp",
            "transactions",
            "nonce",
            "hash",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }
}
