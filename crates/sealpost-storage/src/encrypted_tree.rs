//! Generic sealed sled tree wrapper.
//!
//! [`EncryptedTree<T>`] encrypts values before they reach sled and
//! authenticates them on the way back. Every stored value follows the
//! Encrypt-then-MAC pattern:
//!
//! ```text
//! [nonce 24B] [ciphertext variable] [hmac 32B]
//! hmac = HMAC-SHA256(hmac_key, record_key || nonce || ciphertext)
//! ```
//!
//! Binding the record key into the tag stops a sealed value from being
//! moved under another key. On read, the HMAC is verified **before**
//! any decryption attempt.
//!
//! Writes happen inside multi-tree sled transactions, so sealing is
//! split from insertion: callers [`seal`](EncryptedTree::seal) first and
//! write the bytes through the transactional view of
//! [`tree`](EncryptedTree::tree).

use std::marker::PhantomData;

use sealpost_crypto::aead::{decrypt_xchacha20, encrypt_xchacha20, generate_aead_nonce, AeadNonce, TAG_LEN};
use sealpost_crypto::mac::{hmac_sha256, verify_hmac_sha256, HMAC_SHA256_LEN};
use sealpost_types::{Result, SealpostError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::engine::DerivedKeys;

/// Minimum stored value size: nonce + AEAD tag + HMAC.
const MIN_VALUE_LEN: usize = AeadNonce::LEN + TAG_LEN + HMAC_SHA256_LEN;

// ---------------------------------------------------------------------------
// EncryptedTree
// ---------------------------------------------------------------------------

/// A sled tree where every value is encrypted and HMAC-authenticated.
///
/// `T` is serialized with bincode.
pub struct EncryptedTree<'a, T> {
    tree: sled::Tree,
    keys: &'a DerivedKeys,
    _marker: PhantomData<T>,
}

impl<'a, T> EncryptedTree<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Wraps the given sled tree.
    pub(crate) fn new(tree: sled::Tree, keys: &'a DerivedKeys) -> Self {
        Self {
            tree,
            keys,
            _marker: PhantomData,
        }
    }

    /// The raw tree, for use in transactions.
    pub(crate) fn tree(&self) -> &sled::Tree {
        &self.tree
    }

    /// Retrieves and opens a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// [`SealpostError::StorageError`] if the stored value is malformed
    /// or fails HMAC verification, decryption or deserialization.
    pub fn get(&self, key: &[u8]) -> Result<Option<T>> {
        let raw = self.tree.get(key).map_err(|e| SealpostError::StorageError {
            reason: format!("sled get failed: {e}"),
        })?;

        match raw {
            None => Ok(None),
            Some(bytes) => self.open(key, &bytes).map(Some),
        }
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        self.tree
            .contains_key(key)
            .map_err(|e| SealpostError::StorageError {
                reason: format!("sled contains_key failed: {e}"),
            })
    }

    /// Number of stored values. Walks the whole tree.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the tree holds no values.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Seals `value` for storage under `key`: serialize, encrypt, MAC,
    /// pack.
    ///
    /// A fresh 24-byte nonce is generated for each call.
    ///
    /// # Errors
    ///
    /// - [`SealpostError::StorageError`] if serialization fails.
    /// - [`SealpostError::EncryptionError`] if encryption fails.
    pub(crate) fn seal(&self, key: &[u8], value: &T) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(bincode::serialize(value).map_err(|e| {
            SealpostError::StorageError {
                reason: format!("bincode serialization failed: {e}"),
            }
        })?);

        let nonce = generate_aead_nonce();
        let ciphertext = encrypt_xchacha20(&self.keys.enc_key, &nonce, &plaintext, &[])?;
        let tag = hmac_sha256(&self.keys.hmac_key, &mac_input(key, nonce.as_bytes(), &ciphertext))?;

        let mut output = Vec::with_capacity(AeadNonce::LEN + ciphertext.len() + HMAC_SHA256_LEN);
        output.extend_from_slice(nonce.as_bytes());
        output.extend_from_slice(&ciphertext);
        output.extend_from_slice(&tag);
        Ok(output)
    }

    /// Opens a value sealed under `key`: unpack, verify HMAC, decrypt,
    /// deserialize.
    pub(crate) fn open(&self, key: &[u8], raw: &[u8]) -> Result<T> {
        if raw.len() < MIN_VALUE_LEN {
            return Err(SealpostError::StorageError {
                reason: format!(
                    "stored value too short: expected at least {MIN_VALUE_LEN} bytes, got {}",
                    raw.len()
                ),
            });
        }

        let mut nonce_bytes = [0u8; AeadNonce::LEN];
        nonce_bytes.copy_from_slice(&raw[..AeadNonce::LEN]);

        let hmac_start = raw.len() - HMAC_SHA256_LEN;
        let mut expected = [0u8; HMAC_SHA256_LEN];
        expected.copy_from_slice(&raw[hmac_start..]);

        let ciphertext = &raw[AeadNonce::LEN..hmac_start];

        verify_hmac_sha256(
            &self.keys.hmac_key,
            &mac_input(key, &nonce_bytes, ciphertext),
            &expected,
        )
        .map_err(|_| SealpostError::StorageError {
            reason: "HMAC verification failed: stored value may be tampered".into(),
        })?;

        let plaintext = Zeroizing::new(
            decrypt_xchacha20(
                &self.keys.enc_key,
                &AeadNonce::from_bytes(nonce_bytes),
                ciphertext,
                &[],
            )
            .map_err(|e| SealpostError::StorageError {
                reason: format!("sealed value failed to decrypt: {e}"),
            })?,
        );

        bincode::deserialize(&plaintext).map_err(|e| SealpostError::StorageError {
            reason: format!("bincode deserialization failed: {e}"),
        })
    }
}

fn mac_input(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(key.len() + nonce.len() + ciphertext.len());
    input.extend_from_slice(key);
    input.extend_from_slice(nonce);
    input.extend_from_slice(ciphertext);
    input
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
