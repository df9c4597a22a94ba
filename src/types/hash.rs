//! 32-byte SHA3-256 content hash used throughout the node.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte content hash.
///
/// The all-zero hash is reserved as the genesis sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Returns the all-zero sentinel hash.
    ///
    /// Used as the previous-hash of the genesis block and nowhere else.
    pub fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Returns the hash as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates a hash from a 32-byte slice, rejecting any other length.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        <[u8; HASH_LEN]>::try_from(bytes).ok().map(Hash)
    }

    /// Starts an incremental SHA3-256 computation.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }

    /// Counts the leading zero hex digits (nibbles) of this hash.
    ///
    /// This is the difficulty measure for proof-of-work: a proof hash is valid
    /// at difficulty `d` iff this returns at least `d`.
    pub fn leading_zero_hex_digits(&self) -> usize {
        let mut count = 0;
        for byte in &self.0 {
            if byte >> 4 != 0 {
                return count;
            }
            count += 1;
            if byte & 0x0f != 0 {
                return count;
            }
            count += 1;
        }
        count
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

// Wire representation is the lowercase hex string, matching the external
// block/transaction record formats.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        Hash::from_slice(&bytes).ok_or_else(|| D::Error::custom("expected 32-byte hex hash"))
    }
}

/// Incremental SHA3-256 builder producing a [`Hash`].
///
/// Content hashes are always computed through this builder from a fixed field
/// order with a domain-separation prefix, never from a serialized form, so
/// they cannot drift with encoding changes.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    /// Creates a builder with empty state.
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    /// Feeds bytes into the computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Builder-style variant of [`update`](Self::update).
    pub fn chain(mut self, data: &[u8]) -> Self {
        self.update(data);
        self
    }

    /// Consumes the builder and returns the digest.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}
