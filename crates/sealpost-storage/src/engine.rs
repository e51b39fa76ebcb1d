//! Core storage engine: database lifecycle, key management, and tree access.
//!
//! The [`StorageEngine`] owns the sled database and the keys used to
//! seal records at rest. On [`open`](StorageEngine::open) it validates
//! the master key length, derives sub-keys, opens the database, and
//! creates all required trees. Derived keys are zeroized on drop.

use std::path::Path;

use sealpost_crypto::hkdf::hkdf_sha256;
use sealpost_types::{Result, SealpostError};
use sled::transaction::TransactionError;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identities::IdentityStore;
use crate::messages::MessageStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Required master key length in bytes.
const KEY_LEN: usize = 32;

/// HKDF salt for deriving sub-keys from the master key.
const HKDF_SALT: &[u8] = b"Sealpost-Storage";

/// HKDF info for the encryption sub-key.
const HKDF_INFO_ENC: &[u8] = b"encryption";

/// HKDF info for the HMAC sub-key.
const HKDF_INFO_HMAC: &[u8] = b"hmac";

/// Sealed user records, keyed by user id.
pub(crate) const TREE_USERS: &str = "users";
/// `SHA3-256(email)` to user id.
pub(crate) const TREE_EMAILS: &str = "emails";
/// Sealed private keys, keyed by user id.
pub(crate) const TREE_PRIVATE_KEYS: &str = "private_keys";
/// Sealed messages, keyed by message id.
pub(crate) const TREE_MESSAGES: &str = "messages";
/// `receiver || ordered_secs || nanos || message_id` to empty.
pub(crate) const TREE_BY_RECEIVER: &str = "by_receiver";
/// `author || ordered_secs || nanos || message_id` to empty.
pub(crate) const TREE_BY_AUTHOR: &str = "by_author";
/// Every nonce ever persisted, to the id of the message that used it.
pub(crate) const TREE_NONCES: &str = "nonces";

const ALL_TREES: [&str; 7] = [
    TREE_USERS,
    TREE_EMAILS,
    TREE_PRIVATE_KEYS,
    TREE_MESSAGES,
    TREE_BY_RECEIVER,
    TREE_BY_AUTHOR,
    TREE_NONCES,
];

// ---------------------------------------------------------------------------
// DerivedKeys
// ---------------------------------------------------------------------------

/// Pair of domain-separated keys derived from the master key via HKDF.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct DerivedKeys {
    /// 32-byte key for XChaCha20-Poly1305 encryption.
    pub enc_key: [u8; 32],
    /// 32-byte key for HMAC-SHA256 authentication.
    pub hmac_key: [u8; 32],
}

impl DerivedKeys {
    /// Derives encryption and HMAC keys from a master key using HKDF-SHA256.
    fn derive(master_key: &[u8; 32]) -> Result<Self> {
        let enc_key = hkdf_sha256(master_key, HKDF_SALT, HKDF_INFO_ENC, 32)?.to_key32()?;
        let hmac_key = hkdf_sha256(master_key, HKDF_SALT, HKDF_INFO_HMAC, 32)?.to_key32()?;
        Ok(Self { enc_key, hmac_key })
    }
}

// ---------------------------------------------------------------------------
// StorageEngine
// ---------------------------------------------------------------------------

/// Storage engine backed by sled.
///
/// User records, private keys and messages are sealed with
/// XChaCha20-Poly1305 and authenticated with HMAC-SHA256
/// (Encrypt-then-MAC). Index trees hold ids only. The master key is
/// supplied by the host; the engine never generates it.
///
/// The engine is `Send + Sync`. Share it behind an `Arc` when several
/// threads need access.
pub struct StorageEngine {
    db: sled::Db,
    keys: DerivedKeys,
}

impl StorageEngine {
    /// Opens (or creates) the storage engine at `path`.
    ///
    /// # Errors
    ///
    /// - [`SealpostError::ConfigError`] if `master_key` is not exactly
    ///   32 bytes.
    /// - [`SealpostError::StorageError`] if the database cannot be
    ///   opened.
    pub fn open(path: &Path, master_key: &[u8]) -> Result<Self> {
        let keys = derive_keys(master_key)?;
        let db = sled::open(path).map_err(|e| SealpostError::StorageError {
            reason: format!("failed to open sled database: {e}"),
        })?;
        Self::with_db(db, keys)
    }

    /// Opens an in-memory engine that is discarded on drop.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_temporary(master_key: &[u8]) -> Result<Self> {
        let keys = derive_keys(master_key)?;
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| SealpostError::StorageError {
                reason: format!("failed to open temporary sled database: {e}"),
            })?;
        Self::with_db(db, keys)
    }

    fn with_db(db: sled::Db, keys: DerivedKeys) -> Result<Self> {
        // Pre-create all trees so they exist for later access.
        for name in ALL_TREES {
            db.open_tree(name).map_err(|e| SealpostError::StorageError {
                reason: format!("failed to open tree '{name}': {e}"),
            })?;
        }
        tracing::debug!(trees = ALL_TREES.len(), "storage engine opened");
        Ok(Self { db, keys })
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns [`SealpostError::StorageError`] if the flush fails.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| SealpostError::StorageError {
            reason: format!("failed to flush database: {e}"),
        })?;
        Ok(())
    }

    /// Returns a reference to the derived keys (crate-internal).
    pub(crate) fn keys(&self) -> &DerivedKeys {
        &self.keys
    }

    /// Opens a named sled tree.
    pub(crate) fn open_tree(&self, name: &str) -> Result<sled::Tree> {
        self.db.open_tree(name).map_err(|e| SealpostError::StorageError {
            reason: format!("failed to open tree '{name}': {e}"),
        })
    }

    /// Returns an [`IdentityStore`] for this engine.
    pub fn identities(&self) -> Result<IdentityStore<'_>> {
        IdentityStore::new(self)
    }

    /// Returns a [`MessageStore`] for this engine.
    pub fn messages(&self) -> Result<MessageStore<'_>> {
        MessageStore::new(self)
    }
}

fn derive_keys(master_key: &[u8]) -> Result<DerivedKeys> {
    if master_key.len() != KEY_LEN {
        return Err(SealpostError::ConfigError {
            reason: format!(
                "master key must be {KEY_LEN} bytes, got {}",
                master_key.len()
            ),
        });
    }

    let mut master = [0u8; KEY_LEN];
    master.copy_from_slice(master_key);
    let keys = DerivedKeys::derive(&master);
    master.zeroize();
    keys
}

/// Collapses a sled transaction result into the central error type.
///
/// Aborts carry a [`SealpostError`] already; storage failures become
/// [`SealpostError::StorageError`].
pub(crate) fn map_transaction_error(error: TransactionError<SealpostError>) -> SealpostError {
    match error {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(e) => SealpostError::StorageError {
            reason: format!("sled transaction failed: {e}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_master_key_rejected() {
        let result = StorageEngine::open_temporary(&[0u8; 16]);
        assert!(matches!(result, Err(SealpostError::ConfigError { .. })));
    }

    #[test]
    fn derived_keys_are_domain_separated() -> std::result::Result<(), SealpostError> {
        let keys = DerivedKeys::derive(&[0x11; 32])?;
        assert_ne!(keys.enc_key, keys.hmac_key);
        Ok(())
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageEngine>();
    }

    #[test]
    fn all_trees_created_on_open() -> std::result::Result<(), SealpostError> {
        let engine = StorageEngine::open_temporary(&[0x22; 32])?;
        let names: Vec<Vec<u8>> = engine.db.tree_names().iter().map(|n| n.to_vec()).collect();
        for name in ALL_TREES {
            assert!(names.contains(&name.as_bytes().to_vec()), "missing tree {name}");
        }
        Ok(())
    }
}
