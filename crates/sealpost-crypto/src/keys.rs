//! X25519 key pairs and Diffie-Hellman shared-secret derivation.
//!
//! Every user owns one long-term key pair created at registration.
//! Every send additionally creates a fresh ephemeral pair whose private
//! half is dropped as soon as the shared secret has been derived.
//!
//! Public keys use the single-coordinate Montgomery form (the 32-byte
//! u-coordinate), so there is no separate x/y pair to keep consistent.

use rand::rngs::OsRng;
use sealpost_types::{PublicKey, Result, SealpostError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// X25519 private scalar.
///
/// The underlying `x25519-dalek` [`StaticSecret`](x25519_dalek::StaticSecret)
/// zeroizes its memory on drop.
pub struct PrivateKey(x25519_dalek::StaticSecret);

impl PrivateKey {
    /// Fixed byte length of a private key.
    pub const LEN: usize = 32;

    /// Creates a [`PrivateKey`] from raw 32-byte key material.
    ///
    /// Clamping is performed by `x25519-dalek` during scalar
    /// multiplication, so the raw bytes are stored as-is.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }

    /// Parses a private key from a slice.
    ///
    /// # Errors
    ///
    /// [`SealpostError::InvalidKey`] if `bytes` is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(SealpostError::InvalidKey {
                reason: format!("private key must be 32 bytes, got {}", bytes.len()),
            });
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(bytes);
        let key = Self::from_bytes(raw);
        raw.zeroize();
        Ok(key)
    }

    /// Derives the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(*x25519_dalek::PublicKey::from(&self.0).as_bytes())
    }

    /// Exports the raw scalar for sealed storage. The copy is wiped
    /// when the returned buffer is dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }
}

// PrivateKey does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A public key together with the private key it was derived from.
pub struct KeyPair {
    /// Shareable half.
    pub public: PublicKey,
    /// Secret half. Never leaves the identity store or key service.
    pub private: PrivateKey,
}

/// Generates a fresh key pair from OS entropy.
///
/// Every call draws new randomness; nothing is cached between calls.
pub fn generate_key_pair() -> KeyPair {
    let private = PrivateKey(x25519_dalek::StaticSecret::random_from_rng(OsRng));
    let public = private.public_key();
    KeyPair { public, private }
}

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// Raw X25519 shared secret (32 bytes).
///
/// Never used directly as a cipher key; see
/// [`cipher::derive_message_key`](crate::cipher::derive_message_key).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Wraps externally obtained secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// SharedSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// Computes the Diffie-Hellman shared secret between `local` and
/// `remote`.
///
/// `derive_shared_secret(a.private, b.public)` equals
/// `derive_shared_secret(b.private, a.public)` for any two pairs.
///
/// # Errors
///
/// [`SealpostError::InvalidKey`] if `remote` is a low-order point. The
/// exchange would then produce an all-zero secret that does not depend
/// on `local`.
pub fn derive_shared_secret(local: &PrivateKey, remote: &PublicKey) -> Result<SharedSecret> {
    let their_public = x25519_dalek::PublicKey::from(*remote.as_bytes());
    let raw = local.0.diffie_hellman(&their_public);
    if !raw.was_contributory() {
        return Err(SealpostError::InvalidKey {
            reason: "remote public key is not a valid group element".into(),
        });
    }
    Ok(SharedSecret(*raw.as_bytes()))
}

/// Same as [`derive_shared_secret`] but for untrusted raw encodings.
///
/// # Errors
///
/// [`SealpostError::InvalidKey`] if either slice is not 32 bytes or the
/// remote key is a low-order point.
pub fn derive_shared_secret_from_bytes(local: &[u8], remote: &[u8]) -> Result<SharedSecret> {
    let local = PrivateKey::from_slice(local)?;
    let remote = PublicKey::from_slice(remote)?;
    derive_shared_secret(&local, &remote)
}

/// Runs a single-use exchange against `remote`.
///
/// Generates an ephemeral pair, derives the shared secret and drops the
/// ephemeral private key. The returned public key must travel with the
/// ciphertext so the owner of `remote` can derive the same secret.
pub fn ephemeral_exchange(remote: &PublicKey) -> Result<(PublicKey, SharedSecret)> {
    let ephemeral = generate_key_pair();
    let shared = derive_shared_secret(&ephemeral.private, remote)?;
    Ok((ephemeral.public, shared))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
