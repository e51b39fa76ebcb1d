//! Message store with receiver and author indexes and a nonce ledger.
//!
//! Sealed envelopes live in `messages`, keyed by message id. Two index
//! trees map an owner to that owner's messages:
//!
//! ```text
//! owner_id(32) || ordered_secs_be(8) || subsec_nanos_be(4) || message_id(32)
//! ordered_secs = (unix_secs as u64) ^ (1 << 63)
//! ```
//!
//! Flipping the sign bit makes the big-endian bytes sort the same way as
//! the signed seconds, and the nanosecond field keeps the full precision
//! of the stored [`Timestamp`]. Walking an owner's prefix backwards
//! therefore yields the exact `Timestamp` order, newest first. Messages
//! with identical timestamps come out by message id, highest first. That
//! order is total, so pages never overlap or skip.
//!
//! Every accepted nonce is recorded in `nonces`. A second message with
//! the same nonce is refused with [`SealpostError::NonceReuse`].

use sealpost_types::{MessageId, Result, SealpostError, SecureMessage, Timestamp, UserId};
use sled::transaction::{abort, ConflictableTransactionResult};
use sled::Transactional;

use crate::encrypted_tree::EncryptedTree;
use crate::engine::{
    map_transaction_error, StorageEngine, TREE_BY_AUTHOR, TREE_BY_RECEIVER, TREE_MESSAGES,
    TREE_NONCES,
};

/// Sortable encoding of a timestamp: seconds (8) plus nanoseconds (4).
const TIME_LEN: usize = 12;

/// Byte length of an index key.
const INDEX_KEY_LEN: usize = UserId::LEN + TIME_LEN + MessageId::LEN;

/// Offset of the message id inside an index key.
const INDEX_ID_OFFSET: usize = UserId::LEN + TIME_LEN;

/// Index entries carry everything in the key.
const EMPTY: &[u8] = &[];

// ---------------------------------------------------------------------------
// Index keys
// ---------------------------------------------------------------------------

/// Builds `owner || ordered_secs_be || subsec_nanos_be || message_id`.
fn index_key(owner: &UserId, timestamp: &Timestamp, id: &MessageId) -> [u8; INDEX_KEY_LEN] {
    let datetime = timestamp.as_datetime();
    let ordered_secs = (datetime.timestamp() as u64) ^ (1 << 63);
    let nanos = datetime.timestamp_subsec_nanos();

    let mut key = [0u8; INDEX_KEY_LEN];
    key[..UserId::LEN].copy_from_slice(owner.as_bytes());
    key[UserId::LEN..UserId::LEN + 8].copy_from_slice(&ordered_secs.to_be_bytes());
    key[UserId::LEN + 8..INDEX_ID_OFFSET].copy_from_slice(&nanos.to_be_bytes());
    key[INDEX_ID_OFFSET..].copy_from_slice(id.as_bytes());
    key
}

fn message_id_from_index_key(key: &[u8]) -> Result<MessageId> {
    if key.len() != INDEX_KEY_LEN {
        return Err(SealpostError::StorageError {
            reason: format!(
                "corrupt index key: expected {INDEX_KEY_LEN} bytes, got {}",
                key.len()
            ),
        });
    }
    let mut id = [0u8; MessageId::LEN];
    id.copy_from_slice(&key[INDEX_ID_OFFSET..]);
    Ok(MessageId::new(id))
}

// ---------------------------------------------------------------------------
// MessageStore
// ---------------------------------------------------------------------------

/// Persisted message envelopes and their lookup indexes.
pub struct MessageStore<'a> {
    messages: EncryptedTree<'a, SecureMessage>,
    by_receiver: sled::Tree,
    by_author: sled::Tree,
    nonces: sled::Tree,
}

impl<'a> MessageStore<'a> {
    /// Creates a new `MessageStore` backed by the engine.
    pub(crate) fn new(engine: &'a StorageEngine) -> Result<Self> {
        Ok(Self {
            messages: EncryptedTree::new(engine.open_tree(TREE_MESSAGES)?, engine.keys()),
            by_receiver: engine.open_tree(TREE_BY_RECEIVER)?,
            by_author: engine.open_tree(TREE_BY_AUTHOR)?,
            nonces: engine.open_tree(TREE_NONCES)?,
        })
    }

    /// Persists a message and indexes it under its receiver and author.
    ///
    /// The envelope, both index entries and the nonce ledger entry are
    /// written in one transaction.
    ///
    /// # Errors
    ///
    /// - [`SealpostError::NonceReuse`] if `message.nonce` was already
    ///   used by a stored message. Fatal; the caller must not retry with
    ///   the same envelope.
    /// - [`SealpostError::StorageError`] on sled failure.
    pub fn insert(&self, message: &SecureMessage) -> Result<()> {
        let id = message.id;
        let nonce = message.nonce;
        let sealed = self.messages.seal(id.as_ref(), message)?;
        let receiver_key = index_key(&message.receiver_id, &message.timestamp, &id);
        let author_key = index_key(&message.author_id, &message.timestamp, &id);

        let outcome = (
            self.messages.tree(),
            &self.by_receiver,
            &self.by_author,
            &self.nonces,
        )
            .transaction(
                |(messages, by_receiver, by_author, nonces)| -> ConflictableTransactionResult<(), SealpostError> {
                    if nonces.get(nonce.as_ref())?.is_some() {
                        return abort(SealpostError::NonceReuse {
                            reason: format!("nonce {nonce} already used"),
                        });
                    }
                    messages.insert(id.as_ref(), sealed.as_slice())?;
                    by_receiver.insert(&receiver_key[..], EMPTY)?;
                    by_author.insert(&author_key[..], EMPTY)?;
                    nonces.insert(nonce.as_ref(), id.as_ref())?;
                    Ok(())
                },
            )
            .map_err(map_transaction_error);

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    message_id = %id,
                    author_id = %message.author_id,
                    receiver_id = %message.receiver_id,
                    "message stored"
                );
                Ok(())
            }
            Err(e @ SealpostError::NonceReuse { .. }) => {
                tracing::warn!(message_id = %id, "refused message with reused nonce");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Loads a message by id.
    ///
    /// # Errors
    ///
    /// [`SealpostError::NotFound`] if no message has this id.
    pub fn get(&self, id: &MessageId) -> Result<SecureMessage> {
        self.messages
            .get(id.as_ref())?
            .ok_or_else(|| SealpostError::NotFound {
                reason: format!("message {id}"),
            })
    }

    /// Returns `true` if no message has ever been stored.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total number of stored messages. Walks the whole tree.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Messages addressed to `receiver`, newest first.
    ///
    /// Skips `offset` messages, then returns at most `limit`. Ordering
    /// uses the full nanosecond timestamp; identical timestamps are
    /// ordered by message id, highest first.
    ///
    /// # Errors
    ///
    /// [`SealpostError::NotFound`] only when the store holds no messages
    /// at all. A store with messages but none for `receiver` yields an
    /// empty vector.
    pub fn list_for_receiver(
        &self,
        receiver: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SecureMessage>> {
        self.list(&self.by_receiver, receiver, limit, offset)
    }

    /// Messages written by `author`, newest first. Same ordering and
    /// empty-store rule as [`list_for_receiver`](Self::list_for_receiver).
    pub fn list_by_author(
        &self,
        author: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SecureMessage>> {
        self.list(&self.by_author, author, limit, offset)
    }

    /// Number of messages addressed to `receiver`.
    pub fn count_for_receiver(&self, receiver: &UserId) -> Result<usize> {
        let mut count = 0usize;
        for item in self.by_receiver.scan_prefix(receiver.as_ref()) {
            item.map_err(|e| SealpostError::StorageError {
                reason: format!("sled scan_prefix failed: {e}"),
            })?;
            count += 1;
        }
        Ok(count)
    }

    fn list(
        &self,
        index: &sled::Tree,
        owner: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SecureMessage>> {
        if self.is_empty() {
            return Err(SealpostError::NotFound {
                reason: "message store is empty".into(),
            });
        }

        let mut page = Vec::with_capacity(limit.min(64));
        for item in index.scan_prefix(owner.as_ref()).rev().skip(offset).take(limit) {
            let (key, _) = item.map_err(|e| SealpostError::StorageError {
                reason: format!("sled scan_prefix failed: {e}"),
            })?;
            let id = message_id_from_index_key(&key)?;
            let message = self.get(&id).map_err(|e| match e {
                SealpostError::NotFound { .. } => SealpostError::StorageError {
                    reason: format!("index points at missing message {id}"),
                },
                other => other,
            })?;
            page.push(message);
        }
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use sealpost_types::{MessageNonce, MessageType, PublicKey};

    use super::*;

    fn message(receiver: u8, millis: i64, id_byte: u8) -> std::result::Result<SecureMessage, SealpostError> {
        Ok(SecureMessage {
            id: MessageId::new([id_byte; 32]),
            author_id: UserId::new([0xA0; 32]),
            receiver_id: UserId::new([receiver; 32]),
            timestamp: Timestamp::from_millis(millis)?,
            content: "c2VhbGVk".into(),
            nonce: MessageNonce::new([id_byte; 32]),
            message_type: MessageType::from("text"),
            ephemeral_public_key: PublicKey::new([0x09; 32]),
        })
    }

    #[test]
    fn index_key_orders_negative_before_positive() -> std::result::Result<(), SealpostError> {
        let owner = UserId::new([1; 32]);
        let id = MessageId::new([0; 32]);
        let before_epoch = index_key(&owner, &Timestamp::from_millis(-5)?, &id);
        let after_epoch = index_key(&owner, &Timestamp::from_millis(5)?, &id);
        assert!(before_epoch < after_epoch);
        Ok(())
    }

    #[test]
    fn index_key_orders_within_a_millisecond() -> std::result::Result<(), SealpostError> {
        let owner = UserId::new([1; 32]);
        let earlier: Timestamp = "2024-01-01T00:00:00.000000100Z".parse()?;
        let later: Timestamp = "2024-01-01T00:00:00.000900000Z".parse()?;
        assert_eq!(earlier.timestamp_millis(), later.timestamp_millis());

        // The earlier message gets the higher id; time must still win.
        let earlier_key = index_key(&owner, &earlier, &MessageId::new([0xFF; 32]));
        let later_key = index_key(&owner, &later, &MessageId::new([0x00; 32]));
        assert!(earlier_key < later_key);
        Ok(())
    }

    #[test]
    fn index_key_roundtrips_message_id() -> std::result::Result<(), SealpostError> {
        let id = MessageId::new([0x5C; 32]);
        let key = index_key(&UserId::new([1; 32]), &Timestamp::from_millis(77)?, &id);
        assert_eq!(message_id_from_index_key(&key)?, id);
        assert!(message_id_from_index_key(&key[1..]).is_err());
        Ok(())
    }

    #[test]
    fn insert_then_get() -> std::result::Result<(), SealpostError> {
        let engine = StorageEngine::open_temporary(&[0x33; 32])?;
        let store = engine.messages()?;
        let msg = message(0xB0, 1_000, 0x01)?;
        store.insert(&msg)?;
        assert_eq!(store.get(&msg.id)?, msg);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_message_is_not_found() -> std::result::Result<(), SealpostError> {
        let engine = StorageEngine::open_temporary(&[0x33; 32])?;
        let store = engine.messages()?;
        let result = store.get(&MessageId::new([0xEE; 32]));
        assert!(matches!(result, Err(SealpostError::NotFound { .. })));
        Ok(())
    }

    #[test]
    fn reused_nonce_refused_and_nothing_written() -> std::result::Result<(), SealpostError> {
        let engine = StorageEngine::open_temporary(&[0x33; 32])?;
        let store = engine.messages()?;
        store.insert(&message(0xB0, 1_000, 0x01)?)?;

        let mut replay = message(0xB0, 2_000, 0x02)?;
        replay.nonce = MessageNonce::new([0x01; 32]);
        let result = store.insert(&replay);
        assert!(matches!(result, Err(SealpostError::NonceReuse { .. })));
        assert_eq!(store.len(), 1);
        assert_eq!(store.count_for_receiver(&replay.receiver_id)?, 1);
        Ok(())
    }

    #[test]
    fn zero_limit_returns_nothing() -> std::result::Result<(), SealpostError> {
        let engine = StorageEngine::open_temporary(&[0x33; 32])?;
        let store = engine.messages()?;
        store.insert(&message(0xB0, 1_000, 0x01)?)?;
        assert!(store.list_for_receiver(&UserId::new([0xB0; 32]), 0, 0)?.is_empty());
        Ok(())
    }
}
