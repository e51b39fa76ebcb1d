//! The externally exposed operations: register, look up, log in, send
//! and list.
//!
//! [`Messenger`] owns no global state. The storage engine, the
//! configuration and the clock are injected by the host, so several
//! independent messengers can live in one process.

use std::sync::Arc;

use sealpost_crypto::password::Argon2Params;
use sealpost_storage::engine::StorageEngine;
use sealpost_types::config::AppConfig;
use sealpost_types::{MessageType, Result, SecureMessage, UserId, UserIdentity};

use crate::clock::{Clock, SystemClock};
use crate::outgoing::build_outgoing_envelope;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

/// Entry point for hosts embedding Sealpost.
pub struct Messenger<C: Clock = SystemClock> {
    storage: Arc<StorageEngine>,
    config: AppConfig,
    params: Argon2Params,
    clock: C,
}

impl Messenger<SystemClock> {
    /// Creates a messenger that timestamps with the host clock.
    ///
    /// # Errors
    ///
    /// [`SealpostError::ConfigError`](sealpost_types::SealpostError::ConfigError)
    /// if `config` does not validate.
    pub fn new(storage: Arc<StorageEngine>, config: AppConfig) -> Result<Self> {
        Self::with_clock(storage, config, SystemClock)
    }
}

impl<C: Clock> Messenger<C> {
    /// Creates a messenger with an explicit clock.
    pub fn with_clock(storage: Arc<StorageEngine>, config: AppConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let params = Argon2Params::from(&config);
        Ok(Self {
            storage,
            config,
            params,
            clock,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The clock stamping outgoing messages.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // -- Identity ---------------------------------------------------------

    /// Registers a user and generates their long-term key pair.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if any field is blank.
    /// - `DuplicateUser` if the `(username, email)` pair or the email is
    ///   already registered.
    pub fn create_user(&self, username: &str, email: &str, password: &str) -> Result<UserIdentity> {
        self.storage
            .identities()?
            .create_user(username, email, password, &self.params)
    }

    /// Looks up a user. `NotFound` if absent.
    pub fn get_user(&self, id: &UserId) -> Result<UserIdentity> {
        self.storage.identities()?.get_user(id)
    }

    /// Checks credentials. Unknown email and wrong password both fail
    /// with `InvalidCredentials`.
    pub fn login(&self, email: &str, password: &str) -> Result<UserIdentity> {
        self.storage
            .identities()?
            .verify_login(email, password, &self.params)
    }

    /// Logs in and returns a session able to decrypt the user's inbox.
    pub fn open_session(&self, email: &str, password: &str) -> Result<Session<'_>> {
        let proof = self
            .storage
            .identities()?
            .authenticate(email, password, &self.params)?;
        Ok(Session::new(&self.storage, proof))
    }

    // -- Messages ---------------------------------------------------------

    /// Encrypts `content` for `receiver_id` and stores the envelope.
    ///
    /// The plaintext never reaches storage: the envelope is sealed
    /// before it is handed to the message store.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the caller or the receiver is not registered.
    /// - `InvalidKey` / `EncryptionError` from the cipher.
    /// - `NonceReuse` if the generated nonce collides with a stored one.
    pub fn send_message(
        &self,
        caller_id: &UserId,
        receiver_id: &UserId,
        content: &str,
        message_type: MessageType,
    ) -> Result<SecureMessage> {
        let identities = self.storage.identities()?;
        identities.get_user(caller_id)?;
        let receiver = identities.get_user(receiver_id)?;

        let message = build_outgoing_envelope(
            caller_id,
            &receiver,
            content.as_bytes(),
            message_type,
            self.clock.now(),
        )?;
        self.storage.messages()?.insert(&message)?;

        tracing::debug!(
            message_id = %message.id,
            author_id = %caller_id,
            receiver_id = %receiver_id,
            "message sent"
        );
        Ok(message)
    }

    /// Newest messages addressed to `receiver_id`.
    ///
    /// Returns at most `min(limit, max_page_size)` messages. A larger
    /// `limit` is silently truncated: with the default `max_page_size`
    /// of 100, asking for 200 yields at most 100 even when more exist.
    /// A page shorter than `limit` is therefore not proof of the end of
    /// the inbox; only a page shorter than the effective limit is. Use
    /// [`get_messages_page`](Self::get_messages_page) to read further.
    ///
    /// # Errors
    ///
    /// `NotFound` only when no message has been stored at all.
    pub fn get_messages(&self, receiver_id: &UserId, limit: usize) -> Result<Vec<SecureMessage>> {
        self.get_messages_page(receiver_id, limit, 0)
    }

    /// Same as [`get_messages`](Self::get_messages), skipping the first
    /// `offset` messages. The same `max_page_size` cap applies.
    pub fn get_messages_page(
        &self,
        receiver_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SecureMessage>> {
        self.storage
            .messages()?
            .list_for_receiver(receiver_id, self.page_limit(limit), offset)
    }

    /// Newest messages written by `author_id`, at most
    /// `min(limit, max_page_size)` of them.
    pub fn get_sent_messages(&self, author_id: &UserId, limit: usize) -> Result<Vec<SecureMessage>> {
        self.storage
            .messages()?
            .list_by_author(author_id, self.page_limit(limit), 0)
    }

    /// Effective page size for a requested `limit`.
    fn page_limit(&self, requested: usize) -> usize {
        requested.min(self.config.max_page_size)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use sealpost_types::{SealpostError, Timestamp};

    use super::*;
    use crate::clock::ManualClock;

    fn messenger(max_page_size: usize) -> std::result::Result<Messenger<ManualClock>, SealpostError> {
        let storage = Arc::new(StorageEngine::open_temporary(&[0x5E; 32])?);
        let config = AppConfig {
            argon2_m_cost: 256,
            argon2_t_cost: 1,
            max_page_size,
            ..AppConfig::default()
        };
        Messenger::with_clock(storage, config, ManualClock::new(Timestamp::from_millis(1_000)?))
    }

    #[test]
    fn invalid_config_rejected() -> std::result::Result<(), SealpostError> {
        let storage = Arc::new(StorageEngine::open_temporary(&[0x5E; 32])?);
        let config = AppConfig {
            max_page_size: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            Messenger::new(storage, config),
            Err(SealpostError::ConfigError { .. })
        ));
        Ok(())
    }

    #[test]
    fn limit_capped_at_max_page_size() -> std::result::Result<(), SealpostError> {
        let m = messenger(2)?;
        let alice = m.create_user("alice", "a@x.com", "pw")?;
        let bob = m.create_user("bob", "b@x.com", "pw")?;
        for i in 0..5 {
            m.clock.advance_millis(1);
            m.send_message(&alice.id, &bob.id, &format!("m{i}"), MessageType::from("text"))?;
        }
        assert_eq!(m.page_limit(50), 2);
        assert_eq!(m.page_limit(1), 1);

        // Truncated pages stay full until the inbox runs out.
        assert_eq!(m.get_messages(&bob.id, 50)?.len(), 2);
        assert_eq!(m.get_messages_page(&bob.id, 50, 2)?.len(), 2);
        assert_eq!(m.get_messages_page(&bob.id, 50, 4)?.len(), 1);
        assert_eq!(m.get_sent_messages(&alice.id, 50)?.len(), 2);
        Ok(())
    }

    #[test]
    fn unknown_sender_or_receiver_is_not_found() -> std::result::Result<(), SealpostError> {
        let m = messenger(10)?;
        let alice = m.create_user("alice", "a@x.com", "pw")?;
        let ghost = UserId::new([0xFF; 32]);
        let text = MessageType::from("text");

        assert!(matches!(
            m.send_message(&ghost, &alice.id, "hi", text.clone()),
            Err(SealpostError::NotFound { .. })
        ));
        assert!(matches!(
            m.send_message(&alice.id, &ghost, "hi", text),
            Err(SealpostError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn timestamps_come_from_the_clock() -> std::result::Result<(), SealpostError> {
        let m = messenger(10)?;
        let alice = m.create_user("alice", "a@x.com", "pw")?;
        m.clock.set(Timestamp::from_millis(123_456)?);
        let msg = m.send_message(&alice.id, &alice.id, "note to self", MessageType::from("text"))?;
        assert_eq!(msg.timestamp.timestamp_millis(), 123_456);
        Ok(())
    }
}
