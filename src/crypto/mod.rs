//! Cryptographic primitives: signing keys and wire encryption.
//!
//! - [`key_pair`]: Schnorr key pairs on secp256k1 for transaction signatures
//! - [`cipher`]: XChaCha20-Poly1305 frame encryption with a pre-shared key

pub mod cipher;
pub mod key_pair;
