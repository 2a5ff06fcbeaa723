//! Per-session key derivation and media payload encryption (spec §4.11).
//!
//! Each stream's key is derived once via HKDF-SHA256 from a session secret
//! and the [`StreamId`], then used to seal every fragment payload with
//! ChaCha20-Poly1305. The 96-bit AEAD nonce is built from a per-session
//! random prefix plus the datagram sequence number, so no nonce is ever
//! reused for a given key without also changing the session secret.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use mirage_types::StreamId;
use rand::RngCore;
use sha2::Sha256;

/// Bytes of random prefix mixed into every nonce for a session.
const NONCE_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("AEAD seal failed")]
    SealFailed,
    #[error("AEAD open failed (payload forged, corrupted, or wrong key)")]
    OpenFailed,
}

/// Per-session symmetric key plus the nonce prefix used to keep sequence
/// numbers from repeating across sessions that happen to share a key.
pub struct SessionKey {
    cipher: ChaCha20Poly1305,
    nonce_prefix: [u8; NONCE_PREFIX_LEN],
}

impl SessionKey {
    /// Derive a session key from a master secret and the stream's
    /// identifier, via HKDF-SHA256 with the stream id as context `info`.
    #[must_use]
    pub fn derive(master_secret: &[u8], stream_id: StreamId) -> Self {
        let hk = Hkdf::<Sha256>::new(None, master_secret);
        let mut okm = [0u8; 32];
        let info = stream_id.get().to_le_bytes();
        hk.expand(&info, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&okm));

        let mut nonce_prefix = [0u8; NONCE_PREFIX_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_prefix);

        tracing::debug!(stream_id = stream_id.get(), "derived session key");

        Self {
            cipher,
            nonce_prefix,
        }
    }

    fn nonce_for(&self, sequence: u32) -> Nonce {
        let mut bytes = [0u8; 12];
        bytes[..NONCE_PREFIX_LEN].copy_from_slice(&self.nonce_prefix);
        bytes[NONCE_PREFIX_LEN..].copy_from_slice(&sequence.to_le_bytes());
        *Nonce::from_slice(&bytes)
    }

    /// Seal a fragment payload. `sequence` is the datagram sequence number
    /// carried in the frame header and is folded into the AEAD nonce as
    /// required by spec §4.5 step 3.
    pub fn seal(&self, sequence: u32, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = self.nonce_for(sequence);
        self.cipher
            .encrypt(&nonce, Payload { msg: payload, aad: &[] })
            .map_err(|_| CryptoError::SealFailed)
    }

    /// Open a sealed fragment payload.
    pub fn open(&self, sequence: u32, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = self.nonce_for(sequence);
        self.cipher
            .decrypt(&nonce, Payload { msg: ciphertext, aad: &[] })
            .map_err(|_| CryptoError::OpenFailed)
    }

    /// Nonce prefix, so a receiver that derives the same key (e.g. from a
    /// registration handshake) can reconstruct nonces if the prefix is
    /// exchanged out of band. Out of scope for this core to transmit; kept
    /// for completeness of the key material.
    #[must_use]
    pub fn nonce_prefix(&self) -> [u8; NONCE_PREFIX_LEN] {
        self.nonce_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = SessionKey::derive(b"top secret session material", StreamId::from(1));
        let plaintext = b"encoded frame fragment payload";
        let sealed = key.seal(42, plaintext).unwrap();
        let opened = key.open(42, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn wrong_sequence_fails_to_open() {
        let key = SessionKey::derive(b"top secret session material", StreamId::from(1));
        let sealed = key.seal(42, b"payload").unwrap();
        assert!(key.open(43, &sealed).is_err());
    }

    #[test]
    fn different_streams_derive_different_keys() {
        let secret = b"shared master secret";
        let key_a = SessionKey::derive(secret, StreamId::from(1));
        let key_b = SessionKey::derive(secret, StreamId::from(2));

        let sealed = key_a.seal(0, b"payload").unwrap();
        assert!(key_b.open(0, &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = SessionKey::derive(b"top secret session material", StreamId::from(1));
        let mut sealed = key.seal(7, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(key.open(7, &sealed).is_err());
    }
}
