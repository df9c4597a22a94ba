//! Proof-of-work search loop.

use crate::core::block::Block;
use crate::core::ledger::{valid_proof, ChainError, Ledger};
use crate::core::transaction::Transaction;
use crate::core::txpool::TxPool;
use crate::types::hash::Hash;
use crate::{info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// How many nonce attempts between tip re-checks. Keeps the search responsive
/// to blocks arriving from peers without taking the ledger lock every
/// iteration.
const TIP_CHECK_INTERVAL: u64 = 10_000;

/// Observable miner lifecycle, stored as a u8 behind [`Miner::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MinerState {
    Idle = 0,
    Searching = 1,
}

/// Single-threaded nonce searcher over a shared ledger and pool.
pub struct Miner {
    state: AtomicU8,
}

impl Miner {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(MinerState::Idle as u8),
        }
    }

    pub fn state(&self) -> MinerState {
        match self.state.load(Ordering::Acquire) {
            0 => MinerState::Idle,
            _ => MinerState::Searching,
        }
    }

    /// Runs one mining round: drain the pool, search for a nonce satisfying
    /// the current difficulty, and append the block.
    ///
    /// Returns `None` when the pool is empty; there is nothing worth sealing.
    /// If the tip moves mid-search the search restarts against the new tip,
    /// and a `ChainMismatch` on append triggers the same restart, so the
    /// drained transactions always land in exactly one block.
    pub fn mine(&self, ledger: &Mutex<Ledger>, pool: &TxPool) -> Option<Block> {
        let transactions = pool.drain();
        if transactions.is_empty() {
            return None;
        }

        self.state
            .store(MinerState::Searching as u8, Ordering::Release);
        let block = self.search_and_append(ledger, transactions);
        self.state.store(MinerState::Idle as u8, Ordering::Release);
        Some(block)
    }

    fn search_and_append(&self, ledger: &Mutex<Ledger>, transactions: Vec<Transaction>) -> Block {
        loop {
            let (previous_nonce, previous_hash, difficulty) = {
                let guard = ledger.lock().unwrap();
                let tip = guard.tip();
                (tip.nonce(), tip.hash(), guard.difficulty())
            };

            let Some(nonce) = self.search(ledger, previous_nonce, previous_hash, difficulty)
            else {
                // Tip moved under us; restart against the new one.
                continue;
            };

            let mut guard = ledger.lock().unwrap();
            match guard.append(nonce, transactions.clone(), previous_hash) {
                Ok(block) => {
                    info!(
                        "mined block: index={} nonce={} hash={}",
                        block.index(),
                        block.nonce(),
                        block.hash()
                    );
                    return block;
                }
                Err(ChainError::ChainMismatch { .. }) => {
                    warn!("tip changed during append, restarting search");
                }
                Err(e) => {
                    warn!("append failed: {e}, restarting search");
                }
            }
        }
    }

    /// Scans nonces from zero, re-reading the tip every
    /// [`TIP_CHECK_INTERVAL`] attempts. Returns `None` when the tip has
    /// moved, a satisfying nonce otherwise.
    fn search(
        &self,
        ledger: &Mutex<Ledger>,
        previous_nonce: u64,
        previous_hash: Hash,
        difficulty: usize,
    ) -> Option<u64> {
        let mut nonce = 0u64;
        loop {
            for _ in 0..TIP_CHECK_INTERVAL {
                if valid_proof(previous_nonce, nonce, difficulty) {
                    return Some(nonce);
                }
                nonce = nonce.wrapping_add(1);
            }
            if ledger.lock().unwrap().tip().hash() != previous_hash {
                return None;
            }
        }
    }
}

impl Default for Miner {
    fn default() -> Self {
        Self::new()
    }
}
