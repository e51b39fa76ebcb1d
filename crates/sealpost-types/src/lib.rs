//! Core shared types for the Sealpost secure-messaging backend.
//!
//! Identifiers, records, the central error type and configuration live
//! here so that the crypto, storage and core crates agree on a single
//! vocabulary without depending on one another.

pub mod config;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Stable user identifier: SHA3-256 over the length-prefixed
/// `(username, email)` pair.
///
/// Two registrations with the same username and email always derive
/// the same `UserId`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId([u8; 32]);

impl UserId {
    /// The fixed byte length of a user id.
    pub const LEN: usize = 32;

    /// Creates a new `UserId` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for UserId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for UserId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for UserId {
    type Err = SealpostError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| SealpostError::InvalidInput {
            reason: "invalid hex encoding for user id".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(SealpostError::InvalidInput {
                reason: format!("expected 32 bytes for user id, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// Message identifier: SHA3-256(author || receiver || timestamp || nonce).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId([u8; 32]);

impl MessageId {
    /// The fixed byte length of a message id.
    pub const LEN: usize = 32;

    /// Creates a new `MessageId` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for MessageId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for MessageId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for MessageId {
    type Err = SealpostError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| SealpostError::InvalidInput {
            reason: "invalid hex encoding for message id".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(SealpostError::InvalidInput {
                reason: format!("expected 32 bytes for message id, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// MessageNonce
// ---------------------------------------------------------------------------

/// 256-bit per-message nonce.
///
/// Mixed into the message key derivation, so it must never repeat for
/// the same shared secret. Travels in the clear next to the ciphertext.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageNonce([u8; 32]);

impl MessageNonce {
    /// The fixed byte length of a message nonce.
    pub const LEN: usize = 32;

    /// Creates a new `MessageNonce` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for MessageNonce {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for MessageNonce {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MessageNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// X25519 public key: the 32-byte Montgomery u-coordinate.
///
/// Only the raw encoding lives here. Group operations are performed by
/// `sealpost-crypto`, which also rejects low-order points at exchange
/// time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// The fixed byte length of a public key.
    pub const LEN: usize = 32;

    /// Creates a new `PublicKey` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a public key from a slice, rejecting anything that is not
    /// exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(SealpostError::InvalidKey {
                reason: format!("public key must be 32 bytes, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = SealpostError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| SealpostError::InvalidKey {
            reason: "invalid hex encoding for public key".into(),
        })?;
        Self::from_slice(&bytes)
    }
}

// ---------------------------------------------------------------------------
// PasswordDigest
// ---------------------------------------------------------------------------

/// Salted one-way password hash (Argon2id output plus its salt).
///
/// The plaintext password is never stored.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PasswordDigest {
    /// Random per-user salt.
    pub salt: [u8; 16],
    /// 32-byte Argon2id output.
    pub hash: [u8; 32],
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC timestamp supplied by the host clock.
///
/// Ordering and index keys keep full nanosecond precision. Message ids
/// hash only the millisecond value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a `Timestamp` from milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Result<Self> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| SealpostError::InvalidInput {
                reason: format!("timestamp millis out of range: {millis}"),
            })
    }

    /// Returns the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the timestamp as an RFC 3339 string.
    pub fn as_str(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = SealpostError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| SealpostError::InvalidInput {
                reason: format!("invalid RFC 3339 timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Application-level message tag. Opaque to the backend.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageType(String);

impl MessageType {
    /// Wraps an application tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        Self(tag.to_owned())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// UserIdentity
// ---------------------------------------------------------------------------

/// A registered user. Created once, never mutated.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Identifier derived from `(username, email)`.
    pub id: UserId,
    /// Display name chosen at registration.
    pub username: String,
    /// Login email. Unique across the identity store.
    pub email: String,
    /// Salted Argon2id password hash.
    pub password_hash: PasswordDigest,
    /// Long-term X25519 public key that senders encrypt to.
    pub public_key: PublicKey,
}

// ---------------------------------------------------------------------------
// SecureMessage
// ---------------------------------------------------------------------------

/// Persisted message envelope. `content` is always ciphertext.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecureMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Sender.
    pub author_id: UserId,
    /// Recipient.
    pub receiver_id: UserId,
    /// Host clock time at send.
    pub timestamp: Timestamp,
    /// Base64 of `iv || ciphertext || tag`.
    pub content: String,
    /// Per-message nonce mixed into the message key.
    pub nonce: MessageNonce,
    /// Opaque application tag.
    pub message_type: MessageType,
    /// Sender's single-use X25519 public key for this message. The
    /// recipient combines it with their long-term private key to
    /// recover the shared secret.
    pub ephemeral_public_key: PublicKey,
}

// ---------------------------------------------------------------------------
// SealpostError
// ---------------------------------------------------------------------------

/// Central error type for Sealpost.
///
/// Every crate maps its foreign errors into one of these variants so
/// callers branch on a single enum.
#[derive(Debug, Error)]
pub enum SealpostError {
    /// A user, message or key lookup missed.
    #[error("not found: {reason}")]
    NotFound {
        /// What was looked up.
        reason: String,
    },

    /// Login email or password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration collided with an existing id or email.
    #[error("duplicate user: {reason}")]
    DuplicateUser {
        /// Which field collided.
        reason: String,
    },

    /// Key material has the wrong length, bad encoding, or is not a
    /// usable group element.
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// Human-readable description of the key problem.
        reason: String,
    },

    /// The symmetric cipher rejected an encryption.
    #[error("encryption error: {reason}")]
    EncryptionError {
        /// Human-readable description of the failure.
        reason: String,
    },

    /// Ciphertext could not be authenticated or decrypted.
    #[error("decryption error: {reason}")]
    DecryptionError {
        /// Human-readable description of the failure.
        reason: String,
    },

    /// A nonce was presented a second time. Never retried.
    #[error("nonce reuse detected: {reason}")]
    NonceReuse {
        /// Human-readable description of the reuse.
        reason: String,
    },

    /// A caller-supplied argument is malformed or empty.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of the bad argument.
        reason: String,
    },

    /// Decryption succeeded but the plaintext is not what the caller
    /// can consume (e.g. not UTF-8).
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// Human-readable description of the payload problem.
        reason: String,
    },

    /// The acting identity may not perform this operation.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Human-readable description of the denial.
        reason: String,
    },

    /// A storage or database operation failed.
    #[error("storage error: {reason}")]
    StorageError {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`SealpostError`].
pub type Result<T> = std::result::Result<T, SealpostError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip_hex() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let id = UserId::new([0xABu8; 32]);
        let parsed: UserId = id.to_string().parse()?;
        assert_eq!(id, parsed);
        Ok(())
    }

    #[test]
    fn user_id_invalid_hex_length() {
        let result: std::result::Result<UserId, _> = "abcd".parse();
        assert!(matches!(result, Err(SealpostError::InvalidInput { .. })));
    }

    #[test]
    fn message_id_invalid_hex_chars() {
        let result: std::result::Result<MessageId, _> = "zzzz".parse();
        assert!(result.is_err());
    }

    #[test]
    fn public_key_wrong_length_is_invalid_key() {
        let result = PublicKey::from_slice(&[0u8; 31]);
        assert!(matches!(result, Err(SealpostError::InvalidKey { .. })));
    }

    #[test]
    fn public_key_bad_hex_is_invalid_key() {
        let result: std::result::Result<PublicKey, _> = "not-hex".parse();
        assert!(matches!(result, Err(SealpostError::InvalidKey { .. })));
    }

    #[test]
    fn timestamp_millis_roundtrip() -> std::result::Result<(), SealpostError> {
        let ts = Timestamp::from_millis(1_750_000_000_123)?;
        assert_eq!(ts.timestamp_millis(), 1_750_000_000_123);
        Ok(())
    }

    #[test]
    fn timestamp_now_parses_back() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let ts = Timestamp::now();
        let parsed: Timestamp = ts.as_str().parse()?;
        assert_eq!(ts, parsed);
        Ok(())
    }

    #[test]
    fn timestamps_order_chronologically() -> std::result::Result<(), SealpostError> {
        let earlier = Timestamp::from_millis(1_000)?;
        let later = Timestamp::from_millis(2_000)?;
        assert!(earlier < later);
        Ok(())
    }

    #[test]
    fn message_type_is_opaque() {
        let tag = MessageType::from("text/plain");
        assert_eq!(tag.as_str(), "text/plain");
        assert_eq!(tag.to_string(), "text/plain");
    }

    #[test]
    fn secure_message_serde_json_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let msg = SecureMessage {
            id: MessageId::new([0x01; 32]),
            author_id: UserId::new([0x02; 32]),
            receiver_id: UserId::new([0x03; 32]),
            timestamp: Timestamp::from_millis(42)?,
            content: "AAAA".into(),
            nonce: MessageNonce::new([0x04; 32]),
            message_type: MessageType::from("text"),
            ephemeral_public_key: PublicKey::new([0x05; 32]),
        };
        let json = serde_json::to_string(&msg)?;
        let parsed: SecureMessage = serde_json::from_str(&json)?;
        assert_eq!(msg, parsed);
        Ok(())
    }

    #[test]
    fn error_display() {
        let err = SealpostError::NotFound {
            reason: "user 00ff".into(),
        };
        assert!(err.to_string().contains("user 00ff"));
        assert_eq!(SealpostError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
