//! Outbound message construction.
//!
//! Builds a sealed [`SecureMessage`] from plaintext:
//!
//! 1. Generate the per-message nonce from the send time.
//! 2. Run an ephemeral X25519 exchange against the receiver's
//!    long-term public key.
//! 3. Encrypt the plaintext under the key derived from the shared
//!    secret and the nonce.
//! 4. Compute `message_id = SHA3-256(author || receiver || ts || nonce)`.
//!
//! The ephemeral private key and the shared secret are dropped (and
//! zeroized) before this returns. Nothing is persisted here.

use sealpost_crypto::cipher::encrypt;
use sealpost_crypto::hash::compute_message_id;
use sealpost_crypto::keys::ephemeral_exchange;
use sealpost_crypto::nonce::generate_message_nonce;
use sealpost_types::{MessageType, Result, SecureMessage, Timestamp, UserId, UserIdentity};

/// Builds an encrypted envelope from `author` to `receiver`.
///
/// # Errors
///
/// - [`SealpostError::InvalidKey`](sealpost_types::SealpostError::InvalidKey)
///   if the receiver's public key is unusable.
/// - [`SealpostError::EncryptionError`](sealpost_types::SealpostError::EncryptionError)
///   if the cipher rejects the input.
pub fn build_outgoing_envelope(
    author: &UserId,
    receiver: &UserIdentity,
    plaintext: &[u8],
    message_type: MessageType,
    timestamp: Timestamp,
) -> Result<SecureMessage> {
    // 1. Nonce.
    let nonce = generate_message_nonce(&timestamp);

    // 2. Ephemeral exchange.
    let (ephemeral_public_key, shared) = ephemeral_exchange(&receiver.public_key)?;

    // 3. Encrypt.
    let sealed = encrypt(&shared, plaintext, &nonce)?;

    // 4. Id.
    let id = compute_message_id(author, &receiver.id, &timestamp, &nonce);

    Ok(SecureMessage {
        id,
        author_id: *author,
        receiver_id: receiver.id,
        timestamp,
        content: sealed.to_base64(),
        nonce,
        message_type,
        ephemeral_public_key,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
