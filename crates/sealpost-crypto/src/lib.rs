//! Cryptographic primitives for Sealpost.
//!
//! This crate is the only place that touches raw cryptography. The
//! storage and core crates call into it and never handle cipher keys
//! themselves.
//!
//! # Modules
//!
//! - [`keys`]: X25519 key pairs and shared-secret derivation
//! - [`cipher`]: per-message key derivation and authenticated encryption
//! - [`aead`]: XChaCha20-Poly1305 primitive
//! - [`hkdf`]: HKDF-SHA256
//! - [`hash`]: SHA3-256 and id derivation
//! - [`nonce`]: per-message nonce generation
//! - [`password`]: Argon2id password hashing
//! - [`mac`]: HMAC-SHA256 for sealed storage records

pub mod aead;
pub mod cipher;
pub mod hash;
pub mod hkdf;
pub mod keys;
pub mod mac;
pub mod nonce;
pub mod password;
