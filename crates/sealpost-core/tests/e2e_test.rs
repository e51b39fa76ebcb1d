//! End-to-end scenarios through the public [`Messenger`] surface.
//!
//! Every test runs against its own in-memory engine with a manual
//! clock and light Argon2 parameters.

use std::sync::Arc;

use sealpost_core::{ManualClock, Messenger};
use sealpost_storage::engine::StorageEngine;
use sealpost_types::config::AppConfig;
use sealpost_types::{MessageType, SealpostError, SecureMessage, Timestamp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> AppConfig {
    AppConfig {
        argon2_m_cost: 256,
        argon2_t_cost: 1,
        argon2_p_cost: 1,
        ..AppConfig::default()
    }
}

fn messenger_at(millis: i64) -> Result<Messenger<ManualClock>, SealpostError> {
    let storage = Arc::new(StorageEngine::open_temporary(&[0x3C; 32])?);
    let clock = ManualClock::new(Timestamp::from_millis(millis)?);
    Messenger::with_clock(storage, test_config(), clock)
}

fn text() -> MessageType {
    MessageType::from("text/plain")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn alice_sends_bob_hi() -> Result<(), SealpostError> {
    let m = messenger_at(1_700_000_000_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;

    m.send_message(&alice.id, &bob.id, "hi", text())?;

    let inbox = m.get_messages(&bob.id, 10)?;
    assert_eq!(inbox.len(), 1);
    let msg = &inbox[0];
    assert_eq!(msg.author_id, alice.id);
    assert_eq!(msg.receiver_id, bob.id);
    assert_ne!(msg.content, "hi");
    assert_ne!(msg.nonce.as_bytes(), &[0u8; 32]);
    assert_eq!(msg.message_type, text());

    let session = m.open_session("b@x.com", "pw")?;
    assert_eq!(session.user().id, bob.id);
    assert_eq!(session.decrypt(msg)?, "hi");
    Ok(())
}

#[test]
fn only_the_receiver_may_decrypt() -> Result<(), SealpostError> {
    let m = messenger_at(1_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;
    let msg = m.send_message(&alice.id, &bob.id, "for bob only", text())?;

    let alice_session = m.open_session("a@x.com", "pw")?;
    assert!(matches!(
        alice_session.decrypt(&msg),
        Err(SealpostError::Unauthorized { .. })
    ));
    Ok(())
}

#[test]
fn tampered_envelope_is_decryption_error() -> Result<(), SealpostError> {
    let m = messenger_at(1_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;
    let msg = m.send_message(&alice.id, &bob.id, "hello", text())?;
    let session = m.open_session("b@x.com", "pw")?;

    let mut wrong_nonce: SecureMessage = msg.clone();
    let mut nonce = *wrong_nonce.nonce.as_bytes();
    nonce[0] ^= 0x01;
    wrong_nonce.nonce = nonce.into();
    assert!(matches!(
        session.decrypt(&wrong_nonce),
        Err(SealpostError::DecryptionError { .. })
    ));

    let mut bad_base64 = msg.clone();
    bad_base64.content = "!!not base64!!".into();
    assert!(matches!(
        session.decrypt(&bad_base64),
        Err(SealpostError::DecryptionError { .. })
    ));

    let mut foreign_key = msg;
    foreign_key.ephemeral_public_key = alice.public_key;
    assert!(matches!(
        session.decrypt(&foreign_key),
        Err(SealpostError::DecryptionError { .. })
    ));
    Ok(())
}

#[test]
fn login_with_wrong_password_is_invalid_credentials() -> Result<(), SealpostError> {
    let m = messenger_at(1_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;

    assert_eq!(m.login("a@x.com", "pw")?, alice);
    assert!(matches!(
        m.login("a@x.com", "wrongpass"),
        Err(SealpostError::InvalidCredentials)
    ));
    assert!(matches!(
        m.open_session("a@x.com", "wrongpass"),
        Err(SealpostError::InvalidCredentials)
    ));
    Ok(())
}

#[test]
fn duplicate_registration_rejected() -> Result<(), SealpostError> {
    let m = messenger_at(1_000)?;
    let first = m.create_user("alice", "a@x.com", "pw")?;
    let second = m.create_user("alice", "a@x.com", "pw");
    assert!(matches!(second, Err(SealpostError::DuplicateUser { .. })));
    assert_eq!(m.get_user(&first.id)?, first);
    Ok(())
}

#[test]
fn inbox_is_newest_first_and_deterministic() -> Result<(), SealpostError> {
    let m = messenger_at(0)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;

    for (i, millis) in [5i64, 3, 5, 1].into_iter().enumerate() {
        m.clock().set(Timestamp::from_millis(millis)?);
        m.send_message(&alice.id, &bob.id, &format!("m{i}"), text())?;
    }

    let inbox = m.get_messages(&bob.id, 10)?;
    let order: Vec<i64> = inbox.iter().map(|msg| msg.timestamp.timestamp_millis()).collect();
    assert_eq!(order, vec![5, 5, 3, 1]);
    assert!(inbox[0].id > inbox[1].id);
    assert_eq!(m.get_messages(&bob.id, 2)?, inbox[..2].to_vec());
    assert_eq!(m.get_messages_page(&bob.id, 2, 2)?, inbox[2..].to_vec());
    Ok(())
}

#[test]
fn sends_within_one_millisecond_keep_time_order() -> Result<(), SealpostError> {
    let earlier: Timestamp = "2024-01-01T00:00:00.000000100Z".parse()?;
    let later: Timestamp = "2024-01-01T00:00:00.000900000Z".parse()?;

    // Message ids are random per send; repeat so an id-based order
    // could not pass by luck.
    for _ in 0..10 {
        let m = messenger_at(0)?;
        let alice = m.create_user("alice", "a@x.com", "pw")?;
        let bob = m.create_user("bob", "b@x.com", "pw")?;

        m.clock().set(earlier);
        let first = m.send_message(&alice.id, &bob.id, "first", text())?;
        m.clock().set(later);
        let second = m.send_message(&alice.id, &bob.id, "second", text())?;

        let inbox = m.get_messages(&bob.id, 2)?;
        assert_eq!(inbox, vec![second, first]);
        assert!(inbox[0].timestamp > inbox[1].timestamp);
    }
    Ok(())
}

#[test]
fn empty_store_vs_empty_inbox() -> Result<(), SealpostError> {
    let m = messenger_at(1_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;
    let carol = m.create_user("carol", "c@x.com", "pw")?;

    assert!(matches!(
        m.get_messages(&bob.id, 10),
        Err(SealpostError::NotFound { .. })
    ));

    m.send_message(&alice.id, &bob.id, "hi", text())?;
    assert!(m.get_messages(&carol.id, 10)?.is_empty());
    Ok(())
}

#[test]
fn envelope_json_never_contains_plaintext() -> Result<(), Box<dyn std::error::Error>> {
    let m = messenger_at(1_000)?;
    let alice = m.create_user("alice", "a@x.com", "pw")?;
    let bob = m.create_user("bob", "b@x.com", "pw")?;
    let msg = m.send_message(&alice.id, &bob.id, "a rather distinctive sentence", text())?;

    let json = serde_json::to_string(&msg)?;
    assert!(!json.contains("distinctive"));
    let parsed: SecureMessage = serde_json::from_str(&json)?;
    assert_eq!(m.open_session("b@x.com", "pw")?.decrypt(&parsed)?, "a rather distinctive sentence");
    Ok(())
}
