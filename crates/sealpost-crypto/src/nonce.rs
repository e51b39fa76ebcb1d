//! Per-message nonce generation.
//!
//! `nonce = SHA3-256(timestamp_nanos_be || 32 random bytes)`. The
//! random half comes from the OS CSPRNG, so two nonces generated at the
//! same instant still differ.

use rand::rngs::OsRng;
use rand::RngCore;
use sealpost_types::{MessageNonce, Timestamp};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroize;

/// Generates a fresh, unpredictable nonce for a send at `timestamp`.
pub fn generate_message_nonce(timestamp: &Timestamp) -> MessageNonce {
    let nanos = timestamp
        .as_datetime()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| timestamp.timestamp_millis().saturating_mul(1_000_000));

    let mut random = [0u8; 32];
    OsRng.fill_bytes(&mut random);

    let mut hasher = Sha3_256::new();
    hasher.update(nanos.to_be_bytes());
    hasher.update(random);
    random.zeroize();

    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    MessageNonce::new(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn same_instant_yields_distinct_nonces() -> std::result::Result<(), sealpost_types::SealpostError> {
        let ts = Timestamp::from_millis(1_700_000_000_000)?;
        let seen: HashSet<MessageNonce> = (0..256).map(|_| generate_message_nonce(&ts)).collect();
        assert_eq!(seen.len(), 256);
        Ok(())
    }

    #[test]
    fn nonce_is_not_all_zero() {
        let nonce = generate_message_nonce(&Timestamp::now());
        assert_ne!(nonce.as_bytes(), &[0u8; 32]);
    }
}
