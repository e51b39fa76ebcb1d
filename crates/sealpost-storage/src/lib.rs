//! Sealed storage for Sealpost, backed by sled.
//!
//! User records, private keys and message envelopes are encrypted with
//! XChaCha20-Poly1305 and tamper-protected via HMAC before they reach
//! disk. Subsystems: identity store (users, email index, key pairs) and
//! message store (envelopes, receiver/author indexes, nonce ledger).

pub mod encrypted_tree;
pub mod engine;
pub mod identities;
pub mod messages;
