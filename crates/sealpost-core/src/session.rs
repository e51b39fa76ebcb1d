//! Authenticated session: the only place a user's private key is used.
//!
//! A [`Session`] is opened by [`Messenger::open_session`](crate::Messenger::open_session)
//! after a successful login. It loads the private key on demand for
//! each decryption and drops it immediately afterwards.

use sealpost_crypto::cipher::{decode_content, decrypt};
use sealpost_crypto::keys::derive_shared_secret;
use sealpost_storage::engine::StorageEngine;
use sealpost_storage::identities::Authenticated;
use sealpost_types::{Result, SealpostError, SecureMessage, UserIdentity};

/// A logged-in user.
pub struct Session<'a> {
    storage: &'a StorageEngine,
    proof: Authenticated,
}

impl<'a> Session<'a> {
    pub(crate) fn new(storage: &'a StorageEngine, proof: Authenticated) -> Self {
        Self { storage, proof }
    }

    /// The logged-in user.
    pub fn user(&self) -> &UserIdentity {
        self.proof.identity()
    }

    /// Decrypts a message addressed to this session's user.
    ///
    /// # Errors
    ///
    /// - [`SealpostError::Unauthorized`] if the message is addressed to
    ///   someone else.
    /// - [`SealpostError::DecryptionError`] if the envelope cannot be
    ///   opened: bad encoding, unusable ephemeral key, wrong key or
    ///   tampered bytes.
    /// - [`SealpostError::InvalidPayload`] if decryption succeeded but
    ///   the plaintext is not UTF-8.
    pub fn decrypt(&self, message: &SecureMessage) -> Result<String> {
        let me = self.proof.user_id();
        if message.receiver_id != *me {
            tracing::warn!(
                user_id = %me,
                message_id = %message.id,
                "refused to decrypt message addressed to another user"
            );
            return Err(SealpostError::Unauthorized {
                reason: format!("message {} is not addressed to {me}", message.id),
            });
        }

        let private_key = self.storage.identities()?.private_key(&self.proof)?;
        let shared = derive_shared_secret(&private_key, &message.ephemeral_public_key)
            .map_err(|e| SealpostError::DecryptionError {
                reason: format!("cannot derive message key: {e}"),
            })?;
        drop(private_key);

        let sealed = decode_content(&message.content)?;
        let plaintext = decrypt(&shared, &sealed, &message.nonce)?;

        String::from_utf8(plaintext).map_err(|e| SealpostError::InvalidPayload {
            reason: format!("plaintext is not UTF-8: {e}"),
        })
    }
}
