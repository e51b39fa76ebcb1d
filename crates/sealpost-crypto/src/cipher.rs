//! Per-message authenticated encryption.
//!
//! Each message gets its own symmetric key, derived from the
//! Diffie-Hellman shared secret and the message nonce:
//!
//! ```text
//! message_key = HKDF-SHA256(
//!     IKM  = shared_secret || nonce,
//!     salt = b"Sealpost-Message",
//!     info = b"message-key",
//!     L    = 32
//! )
//! ciphertext  = iv(24) || XChaCha20-Poly1305(message_key, iv, plaintext)
//! ```
//!
//! The raw shared secret is never used directly as a cipher key, and a
//! different nonce always yields an unrelated key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sealpost_types::{MessageNonce, Result, SealpostError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::aead::{decrypt_xchacha20, encrypt_xchacha20, generate_aead_nonce, AeadNonce, TAG_LEN};
use crate::hkdf::hkdf_sha256;
use crate::keys::SharedSecret;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Domain separator for message key derivation.
const MESSAGE_SALT: &[u8] = b"Sealpost-Message";

/// HKDF info label for message keys.
const MESSAGE_INFO: &[u8] = b"message-key";

/// Smallest valid ciphertext: IV plus an empty-plaintext tag.
const MIN_CIPHERTEXT_LEN: usize = AeadNonce::LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// MessageKey
// ---------------------------------------------------------------------------

/// Symmetric key bound to one `(shared_secret, nonce)` pair.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; 32]);

impl MessageKey {
    /// Returns the 32-byte cipher key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// MessageKey does not implement Clone/Debug to prevent leakage.

/// Derives the per-message key from `shared || nonce`.
pub fn derive_message_key(shared: &SharedSecret, nonce: &MessageNonce) -> Result<MessageKey> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(64));
    ikm.extend_from_slice(shared.as_bytes());
    ikm.extend_from_slice(nonce.as_bytes());

    let output = hkdf_sha256(&ikm, MESSAGE_SALT, MESSAGE_INFO, 32)?;
    Ok(MessageKey(output.to_key32()?))
}

// ---------------------------------------------------------------------------
// Ciphertext
// ---------------------------------------------------------------------------

/// Output of [`encrypt`]: the sealed bytes plus the nonce that keyed them.
///
/// The nonce is not secret; it is stored next to the ciphertext.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ciphertext {
    /// `iv || ciphertext || tag`.
    pub ciphertext: Vec<u8>,
    /// Nonce mixed into the message key.
    pub nonce: MessageNonce,
}

impl Ciphertext {
    /// Base64 (standard alphabet, padded) of the sealed bytes, as kept in
    /// the message envelope.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.ciphertext)
    }
}

/// Decodes envelope content produced by [`Ciphertext::to_base64`].
///
/// # Errors
///
/// [`SealpostError::DecryptionError`] if `content` is not valid base64.
pub fn decode_content(content: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(content)
        .map_err(|e| SealpostError::DecryptionError {
            reason: format!("ciphertext is not valid base64: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Encrypt / Decrypt
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` under the key derived from `shared` and `nonce`.
///
/// A fresh random IV is generated per call, so encrypting the same
/// input twice never produces the same bytes.
///
/// # Errors
///
/// [`SealpostError::EncryptionError`] if the cipher rejects the input.
pub fn encrypt(shared: &SharedSecret, plaintext: &[u8], nonce: &MessageNonce) -> Result<Ciphertext> {
    let key = derive_message_key(shared, nonce)?;
    let iv = generate_aead_nonce();
    let sealed = encrypt_xchacha20(key.as_bytes(), &iv, plaintext, &[])?;

    let mut ciphertext = Vec::with_capacity(AeadNonce::LEN + sealed.len());
    ciphertext.extend_from_slice(iv.as_bytes());
    ciphertext.extend_from_slice(&sealed);

    Ok(Ciphertext {
        ciphertext,
        nonce: *nonce,
    })
}

/// Reverses [`encrypt`].
///
/// # Errors
///
/// [`SealpostError::DecryptionError`] if the input is truncated, or
/// the tag does not verify (wrong secret, wrong nonce, any modified
/// bit). No plaintext is returned in that case.
pub fn decrypt(shared: &SharedSecret, ciphertext: &[u8], nonce: &MessageNonce) -> Result<Vec<u8>> {
    if ciphertext.len() < MIN_CIPHERTEXT_LEN {
        return Err(SealpostError::DecryptionError {
            reason: format!(
                "ciphertext too short: expected at least {MIN_CIPHERTEXT_LEN} bytes, got {}",
                ciphertext.len()
            ),
        });
    }

    let mut iv_bytes = [0u8; AeadNonce::LEN];
    iv_bytes.copy_from_slice(&ciphertext[..AeadNonce::LEN]);
    let iv = AeadNonce::from_bytes(iv_bytes);

    let key = derive_message_key(shared, nonce)?;
    decrypt_xchacha20(key.as_bytes(), &iv, &ciphertext[AeadNonce::LEN..], &[])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
