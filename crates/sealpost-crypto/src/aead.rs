//! XChaCha20-Poly1305 authenticated encryption with associated data.
//!
//! 192-bit (24-byte) IVs are drawn from OS entropy for every
//! encryption, which keeps accidental IV collisions negligible even
//! when a key is reused.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sealpost_types::{Result, SealpostError};

/// Length of the Poly1305 authentication tag appended to ciphertexts.
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// AeadNonce
// ---------------------------------------------------------------------------

/// 192-bit IV for XChaCha20-Poly1305.
///
/// Distinct from [`sealpost_types::MessageNonce`], which feeds the key
/// derivation. This value is cipher-level only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AeadNonce([u8; 24]);

impl AeadNonce {
    /// Fixed byte length of an XChaCha20-Poly1305 nonce.
    pub const LEN: usize = 24;

    /// Creates an [`AeadNonce`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying 24-byte array.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }
}

/// Generates a fresh 192-bit random nonce from OS entropy.
pub fn generate_aead_nonce() -> AeadNonce {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    AeadNonce(bytes)
}

// ---------------------------------------------------------------------------
// Encrypt / Decrypt
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` with XChaCha20-Poly1305.
///
/// Returns the ciphertext with the 16-byte tag appended. `aad` is
/// authenticated but not encrypted; pass `&[]` if unused.
///
/// # Errors
///
/// [`SealpostError::EncryptionError`] if the cipher rejects the input.
pub fn encrypt_xchacha20(
    key: &[u8; 32],
    nonce: &AeadNonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload { msg: plaintext, aad };

    cipher
        .encrypt(xnonce, payload)
        .map_err(|e| SealpostError::EncryptionError {
            reason: format!("XChaCha20-Poly1305 encryption failed: {e}"),
        })
}

/// Decrypts `ciphertext` (tag appended) with XChaCha20-Poly1305.
///
/// # Errors
///
/// [`SealpostError::DecryptionError`] if tag verification fails: wrong
/// key, wrong nonce, tampered ciphertext, or wrong AAD.
pub fn decrypt_xchacha20(
    key: &[u8; 32],
    nonce: &AeadNonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(xnonce, payload)
        .map_err(|e| SealpostError::DecryptionError {
            reason: format!("XChaCha20-Poly1305 decryption failed: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
