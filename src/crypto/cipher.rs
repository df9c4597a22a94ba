//! Symmetric wire encryption with a pre-shared key.
//!
//! Every peer-to-peer frame is sealed with XChaCha20-Poly1305 under a 32-byte
//! key established out of band. Frame format: `[24B nonce][ciphertext + 16B tag]`
//! with a fresh random nonce per frame.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

/// XChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 24;

/// Poly1305 authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Errors produced while sealing or opening wire frames.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Frame shorter than a nonce plus tag; cannot possibly decrypt.
    #[error("encrypted frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Authenticated decryption failed (wrong key or tampered frame).
    #[error("frame decryption failed")]
    DecryptFailed,

    /// Encryption failed (payload exceeds the AEAD limit).
    #[error("frame encryption failed")]
    EncryptFailed,
}

/// Authenticated encryption for all peer-to-peer traffic.
///
/// Both sides must hold the same pre-shared key; key distribution is out of
/// scope for the node.
pub struct WireCipher {
    cipher: XChaCha20Poly1305,
}

impl WireCipher {
    /// Creates a cipher from a 32-byte pre-shared key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.into()),
        }
    }

    /// Encrypts a plaintext message into a self-contained frame.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(nonce.as_ref().into(), plaintext)
            .map_err(|_| CipherError::EncryptFailed)?;

        let mut frame = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    /// Decrypts and authenticates a frame produced by [`seal`](Self::seal).
    pub fn open(&self, frame: &[u8]) -> Result<Vec<u8>, CipherError> {
        if frame.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::FrameTooShort(frame.len()));
        }

        let (nonce, ciphertext) = frame.split_at(NONCE_LEN);
        self.cipher
            .decrypt(nonce.into(), ciphertext)
            .map_err(|_| CipherError::DecryptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> WireCipher {
        WireCipher::new(&[7u8; 32])
    }

    #[test]
    fn seal_open_roundtrip() {
        let cipher = test_cipher();
        let frame = cipher.seal(b"the payload").unwrap();
        assert_eq!(cipher.open(&frame).unwrap(), b"the payload");
    }

    #[test]
    fn nonces_are_unique_per_frame() {
        let cipher = test_cipher();
        let frame1 = cipher.seal(b"same message").unwrap();
        let frame2 = cipher.seal(b"same message").unwrap();
        assert_ne!(frame1, frame2);
    }

    #[test]
    fn open_fails_with_wrong_key() {
        let frame = test_cipher().seal(b"secret").unwrap();
        let other = WireCipher::new(&[8u8; 32]);
        assert!(matches!(other.open(&frame), Err(CipherError::DecryptFailed)));
    }

    #[test]
    fn open_fails_on_tampered_frame() {
        let cipher = test_cipher();
        let mut frame = cipher.seal(b"secret").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(cipher.open(&frame), Err(CipherError::DecryptFailed)));
    }

    #[test]
    fn open_rejects_truncated_frame() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.open(&[0u8; NONCE_LEN + TAG_LEN - 1]),
            Err(CipherError::FrameTooShort(_))
        ));
    }

    #[test]
    fn empty_payload_roundtrips() {
        let cipher = test_cipher();
        let frame = cipher.seal(b"").unwrap();
        assert!(cipher.open(&frame).unwrap().is_empty());
    }
}
