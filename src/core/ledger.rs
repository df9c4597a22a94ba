//! Append-only hash-chained ledger with proof-of-work acceptance.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use crate::{info, warn};
use thiserror::Error;

/// Chain-level failures.
#[derive(Debug, Error)]
pub enum ChainError {
    /// An append raced with another writer: the supplied previous hash no
    /// longer matches the tip. The losing writer retries against the new tip.
    #[error("chain mismatch: expected previous hash {expected}, got {got}")]
    ChainMismatch { expected: Hash, got: Hash },

    /// A received block failed structural validation (bad hash, bad index, or
    /// an unsatisfied proof-of-work).
    #[error("invalid block at index {0}")]
    InvalidBlock(u64),
}

/// The sole proof-of-work acceptance predicate.
///
/// Hashes the concatenation of the tip nonce and the candidate nonce and
/// accepts iff the first `difficulty` hex digits of the digest are zero. Pure
/// and side-effect free, so miner and validators always agree. Note that the
/// proof binds only the nonce pair, not the block body.
pub fn valid_proof(previous_nonce: u64, nonce: u64, difficulty: usize) -> bool {
    let digest = Hash::sha3()
        .chain(b"ZONE_PROOF")
        .chain(&previous_nonce.to_le_bytes())
        .chain(&nonce.to_le_bytes())
        .finalize();
    digest.leading_zero_hex_digits() >= difficulty
}

/// Ordered, non-empty sequence of hash-chained blocks.
///
/// The ledger exclusively owns its blocks; once appended they are never
/// mutated or handed out by mutable reference. All tip mutations go through a
/// single `&mut self` writer, so callers serialize appends with whatever lock
/// wraps the ledger.
pub struct Ledger {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl Ledger {
    /// Creates a ledger holding only the genesis block.
    pub fn genesis(difficulty: usize) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty,
        }
    }

    /// Number of leading zero hex digits a proof hash must show.
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// The current tip block. The chain is never empty.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("ledger always holds genesis")
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// All blocks in chain order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a freshly mined block referencing `previous_hash`.
    ///
    /// Fails with [`ChainError::ChainMismatch`] when `previous_hash` is not
    /// the current tip hash, which happens when a competing block landed
    /// first. The caller retries against the refreshed tip.
    pub fn append(
        &mut self,
        nonce: u64,
        transactions: Vec<Transaction>,
        previous_hash: Hash,
    ) -> Result<Block, ChainError> {
        let tip_hash = self.tip().hash();
        if previous_hash != tip_hash {
            return Err(ChainError::ChainMismatch {
                expected: tip_hash,
                got: previous_hash,
            });
        }

        let block = Block::new(self.tip().index() + 1, previous_hash, transactions, nonce);
        info!(
            "appending block: index={} hash={} transactions={}",
            block.index(),
            block.hash(),
            block.transactions().len()
        );
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Ingests a complete block received from a peer.
    ///
    /// Checks linkage against the tip, sequential index, intact content hash,
    /// and the proof-of-work before appending. A stale or malformed block is
    /// rejected without touching the chain.
    pub fn ingest(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.tip();
        if block.previous_hash() != tip.hash() {
            return Err(ChainError::ChainMismatch {
                expected: tip.hash(),
                got: block.previous_hash(),
            });
        }
        if block.index() != tip.index() + 1
            || !block.verify_hash()
            || !valid_proof(tip.nonce(), block.nonce(), self.difficulty)
        {
            return Err(ChainError::InvalidBlock(block.index()));
        }

        info!(
            "ingesting block from peer: index={} hash={}",
            block.index(),
            block.hash()
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Walks the full chain and confirms every adjacency link and every
    /// block's own content hash.
    ///
    /// Used after receiving a full chain from a peer to decide acceptance.
    pub fn is_chain_valid(&self) -> bool {
        Self::blocks_are_valid(&self.blocks)
    }

    /// Replaces the chain with a longer valid candidate received from a peer.
    ///
    /// Returns `true` when adopted. Shorter-or-equal candidates, broken
    /// chains, and candidates with unsatisfied proofs are refused; this is
    /// longest-valid-chain only, with no fork-choice beyond it.
    pub fn try_adopt(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.blocks.len() {
            return false;
        }
        if !Self::blocks_are_valid(&candidate) {
            warn!("refusing peer chain: broken hash links");
            return false;
        }
        for pair in candidate.windows(2) {
            if !valid_proof(pair[0].nonce(), pair[1].nonce(), self.difficulty) {
                warn!(
                    "refusing peer chain: proof fails at index {}",
                    pair[1].index()
                );
                return false;
            }
        }

        info!(
            "adopting peer chain: {} -> {} blocks",
            self.blocks.len(),
            candidate.len()
        );
        self.blocks = candidate;
        true
    }

    fn blocks_are_valid(blocks: &[Block]) -> bool {
        let Some(genesis) = blocks.first() else {
            return false;
        };
        if genesis.index() != 1 || genesis.previous_hash() != Hash::zero() {
            return false;
        }

        for (i, block) in blocks.iter().enumerate() {
            if !block.verify_hash() {
                return false;
            }
            if i > 0 {
                let parent = &blocks[i - 1];
                if block.previous_hash() != parent.hash() || block.index() != parent.index() + 1 {
                    return false;
                }
            }
        }
        true
    }
}
