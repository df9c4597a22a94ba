//! Shared fixtures for ledger and network tests.

#[cfg(test)]
pub mod utils {
    use crate::core::ledger::{valid_proof, Ledger};
    use crate::core::transaction::Transaction;
    use crate::crypto::key_pair::{Address, PrivateKey};

    /// A signed transaction to a throwaway recipient.
    pub fn signed_tx(amount: u64) -> Transaction {
        Transaction::new(Address::zero(), amount, &PrivateKey::new()).unwrap()
    }

    /// Brute-forces the first nonce satisfying the ledger's difficulty
    /// against its current tip.
    pub fn next_nonce(ledger: &Ledger) -> u64 {
        let previous = ledger.tip().nonce();
        (0..)
            .find(|&n| valid_proof(previous, n, ledger.difficulty()))
            .unwrap()
    }
}
