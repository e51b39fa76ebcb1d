//! HKDF-SHA256 key derivation (RFC 5869).
//!
//! Used to turn Diffie-Hellman output into per-message cipher keys and
//! to split the storage master key into domain-separated sub-keys.

use hkdf::Hkdf;
use sealpost_types::{Result, SealpostError};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Upper bound on derived output. One or two 32-byte keys is all any
/// caller needs.
const MAX_OUTPUT_LEN: usize = 64;

// ---------------------------------------------------------------------------
// HkdfOutput
// ---------------------------------------------------------------------------

/// Derived key material, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HkdfOutput {
    bytes: Vec<u8>,
}

impl HkdfOutput {
    /// Returns the derived key material as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the length of the derived key material.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies the first 32 bytes into a fixed-size key.
    ///
    /// # Errors
    ///
    /// [`SealpostError::InvalidKey`] if fewer than 32 bytes were derived.
    pub fn to_key32(&self) -> Result<[u8; 32]> {
        if self.bytes.len() < 32 {
            return Err(SealpostError::InvalidKey {
                reason: format!("derived key too short: {} bytes", self.bytes.len()),
            });
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.bytes[..32]);
        Ok(key)
    }
}

// HkdfOutput does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derives `output_len` bytes from `ikm` using HKDF-SHA256.
///
/// An empty `salt` is valid; HKDF then uses a zero-filled salt of hash
/// length.
///
/// # Errors
///
/// [`SealpostError::InvalidKey`] if `output_len` is 0 or exceeds 64.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], output_len: usize) -> Result<HkdfOutput> {
    if output_len == 0 || output_len > MAX_OUTPUT_LEN {
        return Err(SealpostError::InvalidKey {
            reason: format!("HKDF output length must be 1..={MAX_OUTPUT_LEN}, got {output_len}"),
        });
    }

    let salt_opt: Option<&[u8]> = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt_opt, ikm);

    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm)
        .map_err(|e| SealpostError::InvalidKey {
            reason: format!("HKDF-SHA256 expansion failed: {e}"),
        })?;

    Ok(HkdfOutput { bytes: okm })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
