//! Pending-transaction pool keyed by transaction hash.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use crate::warn;
use dashmap::DashMap;
use std::sync::RwLock;

/// Concurrent holding area for validated transactions awaiting inclusion.
///
/// Lookup runs against the map; `order` remembers insertion order so drained
/// batches enter a block in the order they arrived. Every mutation takes the
/// order lock before touching the map, which keeps `drain` atomic with
/// respect to concurrent `add`s.
#[derive(Default)]
pub struct TxPool {
    transactions: DashMap<Hash, Transaction>,
    order: RwLock<Vec<Hash>>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and admits a transaction.
    ///
    /// Returns `false` only when verification fails. A hash already present
    /// is a no-op that still reports `true`, so re-broadcast duplicates are
    /// indistinguishable from a first delivery.
    pub fn add(&self, transaction: Transaction) -> bool {
        if let Err(e) = transaction.validate() {
            warn!("rejecting transaction: {e}");
            return false;
        }

        let hash = transaction.hash();
        let mut order = self.order.write().unwrap();
        if self.transactions.contains_key(&hash) {
            return true;
        }
        self.transactions.insert(hash, transaction);
        order.push(hash);
        true
    }

    /// Removes and returns every pending transaction in insertion order.
    ///
    /// Atomic: a transaction added concurrently lands either in this batch or
    /// in the pool for the next one, never in both and never lost.
    pub fn drain(&self) -> Vec<Transaction> {
        let mut order = self.order.write().unwrap();
        let drained = order
            .drain(..)
            .filter_map(|hash| self.transactions.remove(&hash).map(|(_, tx)| tx))
            .collect();
        drained
    }

    /// Drops the given hashes, typically after they were confirmed in a block
    /// received from a peer. Unknown hashes are ignored.
    pub fn remove_batch(&self, hashes: &[Hash]) {
        let mut order = self.order.write().unwrap();
        for hash in hashes {
            if self.transactions.remove(hash).is_some() {
                order.retain(|h| h != hash);
            }
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.order.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
    fn add_then_contains() {
        let pool = TxPool::new();
        let tx = new_tx(5);
        let hash = tx.hash();

        assert!(pool.add(tx));
        assert!(pool.contains(&hash));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn add_is_idempotent() {
        let pool = TxPool::new();
        let tx = new_tx(5);

        assert!(pool.add(tx.clone()));
        assert!(pool.add(tx));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn add_rejects_tampered_signature() {
        let pool = TxPool::new();
        let good = new_tx(5);
        let forged = Transaction::from_parts(
            *good.from(),
            good.to(),
            good.amount() + 1,
            good.signature().clone(),
        )
        .unwrap();

        assert!(!pool.add(forged));
        assert!(pool.is_empty());
    }

    #[test]
    fn drain_preserves_insertion_order() {
        let pool = TxPool::new();
        let txs: Vec<Transaction> = (1..=4).map(new_tx).collect();
        for tx in &txs {
            assert!(pool.add(tx.clone()));
        }

        let drained = pool.drain();
        assert!(pool.is_empty());
        let expected: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
        let got: Vec<Hash> = drained.iter().map(Transaction::hash).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn drain_empty_pool_yields_nothing() {
        let pool = TxPool::new();
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn remove_batch_drops_confirmed() {
        let pool = TxPool::new();
        let keep = new_tx(1);
        let confirmed = new_tx(2);
        pool.add(keep.clone());
        pool.add(confirmed.clone());

        pool.remove_batch(&[confirmed.hash()]);
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&keep.hash()));
        assert!(!pool.contains(&confirmed.hash()));
    }

    #[test]
    fn concurrent_adds_all_land_once() {
        use std::sync::Arc;

        let pool = Arc::new(TxPool::new());
        let txs: Vec<Transaction> = (1..=32).map(new_tx).collect();

        let handles: Vec<_> = txs
            .chunks(8)
            .map(|chunk| {
                let pool = Arc::clone(&pool);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for tx in chunk {
                        assert!(pool.add(tx));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.len(), 32);
        assert_eq!(pool.drain().len(), 32);
    }

    #[test]
    fn drain_racing_adds_loses_nothing_and_duplicates_nothing() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let pool = Arc::new(TxPool::new());
        let txs: Vec<Transaction> = (1..=64).map(new_tx).collect();
        let all: HashSet<Hash> = txs.iter().map(Transaction::hash).collect();

        let adders: Vec<_> = txs
            .chunks(16)
            .map(|chunk| {
                let pool = Arc::clone(&pool);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for tx in chunk {
                        assert!(pool.add(tx));
                        std::thread::yield_now();
                    }
                })
            })
            .collect();

        let drainer = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let mut batches = Vec::new();
                for _ in 0..50 {
                    batches.push(pool.drain());
                    std::thread::yield_now();
                }
                batches
            })
        };

        for handle in adders {
            handle.join().unwrap();
        }
        let batches = drainer.join().unwrap();

        let mut seen = HashSet::new();
        for batch in batches {
            for tx in batch {
                assert!(seen.insert(tx.hash()), "transaction drained twice");
            }
        }
        for tx in pool.drain() {
            assert!(seen.insert(tx.hash()), "transaction drained twice");
        }
        assert_eq!(seen, all);
    }
}
