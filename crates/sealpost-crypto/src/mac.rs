//! HMAC-SHA256 message authentication codes.
//!
//! The storage layer authenticates sealed records with these tags
//! before any decryption is attempted (Encrypt-then-MAC).

use hmac::{Hmac, Mac};
use sealpost_types::{Result, SealpostError};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fixed output length of HMAC-SHA256 in bytes.
pub const HMAC_SHA256_LEN: usize = 32;

/// Computes HMAC-SHA256 over `data` using `key`.
///
/// # Errors
///
/// [`SealpostError::InvalidKey`] if HMAC initialisation fails (not
/// expected with SHA-256, but propagated rather than unwrapped).
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| SealpostError::InvalidKey {
        reason: format!("HMAC-SHA256 key init failed: {e}"),
    })?;
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; HMAC_SHA256_LEN];
    output.copy_from_slice(&result);
    Ok(output)
}

/// Verifies an HMAC-SHA256 tag in constant time.
///
/// # Errors
///
/// - [`SealpostError::InvalidKey`] if HMAC initialisation fails.
/// - [`SealpostError::DecryptionError`] if the tag does not match.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], expected: &[u8; HMAC_SHA256_LEN]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| SealpostError::InvalidKey {
        reason: format!("HMAC-SHA256 key init failed: {e}"),
    })?;
    mac.update(data);

    mac.verify_slice(expected)
        .map_err(|_| SealpostError::DecryptionError {
            reason: "HMAC-SHA256 tag mismatch".into(),
        })
}
