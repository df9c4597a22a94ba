//! Schnorr signature key pairs on secp256k1.

use crate::types::hash::Hash;
use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Private key for signing transactions.
///
/// Generated from OS entropy. Never serialized and never sent over the wire.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Generates a new random private key.
    pub fn new() -> Self {
        let mut rng = OsRng;
        Self {
            key: SigningKey::random(&mut rng),
        }
    }

    /// Creates a private key from raw scalar bytes.
    ///
    /// Returns `None` if the bytes are not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_bytes(bytes).ok().map(|key| Self { key })
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(*self.key.verifying_key())
    }

    /// Signs arbitrary data, producing a Schnorr signature.
    pub fn sign(&self, data: &[u8]) -> SerializableSignature {
        SerializableSignature(self.key.sign(data))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Public key identifying a transaction sender.
///
/// `Copy` (52 bytes: 32 key + 20 address) because public keys are passed on
/// every signature verification and stack copies keep them cache-local.
/// The address is derived once at construction so both stay consistent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
    address: Address,
}

impl PublicKey {
    /// Wraps a verifying key, deriving its address.
    ///
    /// Address derivation: `SHA3-256(key_bytes)[12..32]`.
    fn from_verifying_key(key: VerifyingKey) -> Self {
        let full = Hash::sha3().chain(&key.to_bytes()).finalize();
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&full.as_slice()[12..]);
        PublicKey {
            key,
            address: Address(addr),
        }
    }

    /// Parses a public key from its 32-byte x-only encoding.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        VerifyingKey::from_bytes(bytes)
            .ok()
            .map(Self::from_verifying_key)
    }

    /// Returns the 32-byte x-only encoding of this key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes().into()
    }

    /// Returns the address derived from this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Verifies a Schnorr signature over the given data.
    pub fn verify(&self, data: &[u8], signature: &SerializableSignature) -> bool {
        self.key.verify(data, &signature.0).is_ok()
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        PublicKey::from_bytes(&bytes)
            .ok_or_else(|| D::Error::custom("expected 32-byte x-only public key"))
    }
}

/// Fixed-size 20-byte account address derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Returns the all-zero address, usable as a burn/test recipient.
    pub fn zero() -> Address {
        Address([0u8; ADDRESS_LEN])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        <[u8; ADDRESS_LEN]>::try_from(bytes.as_slice())
            .map(Address)
            .map_err(|_| D::Error::custom("expected 20-byte hex address"))
    }
}

/// Wrapper around the raw Schnorr [`Signature`] carrying serde support.
///
/// Serialized as the 64-byte signature in hex.
#[derive(Clone)]
pub struct SerializableSignature(pub Signature);

impl fmt::Debug for SerializableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializableSignature({})", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for SerializableSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for SerializableSignature {}

impl SerializableSignature {
    /// Returns the 64-byte encoding of the signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Parses a signature from its 64-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Signature::try_from(bytes).ok().map(SerializableSignature)
    }
}

impl From<Signature> for SerializableSignature {
    fn from(sig: Signature) -> Self {
        SerializableSignature(sig)
    }
}

impl Serialize for SerializableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for SerializableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        SerializableSignature::from_bytes(&bytes)
            .ok_or_else(|| D::Error::custom("expected 64-byte Schnorr signature"))
    }
}
