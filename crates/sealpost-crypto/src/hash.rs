//! SHA3-256 hashing and deterministic identifier derivation.
//!
//! Variable-length fields are length-prefixed so that
//! `("ab", "c@x")` and `("a", "bc@x")` never hash to the same id.

use sealpost_types::{MessageId, MessageNonce, Timestamp, UserId};
use sha3::{Digest, Sha3_256};

/// Domain tag for user id derivation.
const USER_ID_DOMAIN: &[u8] = b"sealpost-user-v1";

/// Domain tag for message id derivation.
const MESSAGE_ID_DOMAIN: &[u8] = b"sealpost-msg-v1";

/// Computes the SHA3-256 hash of arbitrary data.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    finalize(hasher)
}

/// Derives the stable [`UserId`] for a `(username, email)` pair.
///
/// Formula: `SHA3-256(domain || len(username)_be64 || username || len(email)_be64 || email)`
pub fn derive_user_id(username: &str, email: &str) -> UserId {
    let mut hasher = Sha3_256::new();
    hasher.update(USER_ID_DOMAIN);
    update_prefixed(&mut hasher, username.as_bytes());
    update_prefixed(&mut hasher, email.as_bytes());
    UserId::new(finalize(hasher))
}

/// Computes a message id from its author, receiver, creation time and
/// nonce.
///
/// Formula: `SHA3-256(domain || author || receiver || timestamp_millis_be || nonce)`
///
/// The nonce keeps two sends within the same millisecond apart.
pub fn compute_message_id(
    author: &UserId,
    receiver: &UserId,
    timestamp: &Timestamp,
    nonce: &MessageNonce,
) -> MessageId {
    let mut hasher = Sha3_256::new();
    hasher.update(MESSAGE_ID_DOMAIN);
    hasher.update(author.as_ref());
    hasher.update(receiver.as_ref());
    hasher.update(timestamp.timestamp_millis().to_be_bytes());
    hasher.update(nonce.as_ref());
    MessageId::new(finalize(hasher))
}

fn update_prefixed(hasher: &mut Sha3_256, field: &[u8]) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field);
}

fn finalize(hasher: Sha3_256) -> [u8; 32] {
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
