//! Signed transfer records.

use crate::crypto::key_pair::{Address, PrivateKey, PublicKey, SerializableSignature};
use crate::types::hash::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Validation failures for a single transaction.
///
/// These are boundary errors: the transaction is rejected, logged, and the
/// rest of the node state is untouched.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Transfers must move a strictly positive amount.
    #[error("invalid transaction amount: {0}")]
    InvalidAmount(u64),

    /// The signature does not verify against the sender's public key.
    #[error("transaction signature verification failed for sender {0}")]
    SignatureInvalid(Address),
}

/// An immutable signed transfer of `amount` from `from` to `to`.
///
/// Fields are private and there are no mutators, so the content hash can be
/// recomputed from the fields at any time and can never go stale. A received
/// record is re-validated before it enters any pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    from: PublicKey,
    to: Address,
    amount: u64,
    signature: SerializableSignature,
}

impl Transaction {
    /// Creates and signs a new transaction.
    ///
    /// Fails with [`TransactionError::InvalidAmount`] on a zero amount.
    pub fn new(to: Address, amount: u64, key: &PrivateKey) -> Result<Self, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount(amount));
        }

        let from = key.public_key();
        let signing = Self::signing_hash(&from, &to, amount);
        Ok(Self {
            from,
            to,
            amount,
            signature: key.sign(signing.as_slice()),
        })
    }

    /// Assembles a transaction from an externally submitted record.
    ///
    /// The amount check runs here; the signature is checked separately by
    /// [`validate`](Self::validate) at pool admission.
    pub fn from_parts(
        from: PublicKey,
        to: Address,
        amount: u64,
        signature: SerializableSignature,
    ) -> Result<Self, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount(amount));
        }
        Ok(Self {
            from,
            to,
            amount,
            signature,
        })
    }

    /// Sender public key.
    pub fn from(&self) -> &PublicKey {
        &self.from
    }

    /// Recipient address.
    pub fn to(&self) -> Address {
        self.to
    }

    /// Transferred amount, always non-zero.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Signature over the canonical signing hash.
    pub fn signature(&self) -> &SerializableSignature {
        &self.signature
    }

    /// Content hash identifying this transaction.
    ///
    /// Recomputed from the fields on every call: it includes the signature, so
    /// identical transfers signed by different keys stay distinct, and it is
    /// the pool's deduplication key.
    pub fn hash(&self) -> Hash {
        Hash::sha3()
            .chain(b"ZONE_TXID")
            .chain(&self.from.to_bytes())
            .chain(&self.to.0)
            .chain(&self.amount.to_le_bytes())
            .chain(&self.signature.to_bytes())
            .finalize()
    }

    /// Checks the signature against the sender's declared public key.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let signing = Self::signing_hash(&self.from, &self.to, self.amount);
        if self.from.verify(signing.as_slice(), &self.signature) {
            Ok(())
        } else {
            Err(TransactionError::SignatureInvalid(self.from.address()))
        }
    }

    /// Canonical domain-separated hash of `{sender, recipient, amount}`.
    ///
    /// Both signer and verifier derive the signed bytes from the fields in
    /// this fixed order, independent of any wire encoding.
    fn signing_hash(from: &PublicKey, to: &Address, amount: u64) -> Hash {
        Hash::sha3()
            .chain(b"ZONE_TX")
            .chain(&from.to_bytes())
            .chain(&to.0)
            .chain(&amount.to_le_bytes())
            .finalize()
    }
}

/// External submission record: `{sender, recipient, amount, signature}`.
#[derive(Serialize, Deserialize)]
struct TransactionRecord {
    sender: PublicKey,
    recipient: Address,
    amount: u64,
    signature: SerializableSignature,
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TransactionRecord {
            sender: self.from,
            recipient: self.to,
            amount: self.amount,
            signature: self.signature.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = TransactionRecord::deserialize(deserializer)?;
        Transaction::from_parts(
            record.sender,
            record.recipient,
            record.amount,
            record.signature,
        )
        .map_err(serde::de::Error::custom)
    }
}
