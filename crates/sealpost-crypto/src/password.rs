//! Argon2id password hashing.
//!
//! Each registration draws a random 16-byte salt; the digest stored in
//! [`PasswordDigest`] is `Argon2id(password, salt)`. Verification
//! recomputes the digest and compares in constant time.

use rand::rngs::OsRng;
use rand::RngCore;
use sealpost_types::config::AppConfig;
use sealpost_types::{PasswordDigest, Result, SealpostError};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Salt length generated for new digests.
const SALT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Argon2Params
// ---------------------------------------------------------------------------

/// Configurable parameters for Argon2id.
///
/// | Parameter | Default | Meaning |
/// |-----------|---------|---------|
/// | `m_cost`  | 65 536  | Memory usage in KiB (64 MiB) |
/// | `t_cost`  | 3       | Number of iterations |
/// | `p_cost`  | 1       | Degree of parallelism |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Argon2Params {
    /// Memory cost in KiB. Must be ≥ 8 × `p_cost`.
    pub m_cost: u32,
    /// Time cost (number of passes). Must be ≥ 1.
    pub t_cost: u32,
    /// Parallelism degree. Must be ≥ 1.
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            m_cost: 65_536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl From<&AppConfig> for Argon2Params {
    fn from(config: &AppConfig) -> Self {
        Self {
            m_cost: config.argon2_m_cost,
            t_cost: config.argon2_t_cost,
            p_cost: config.argon2_p_cost,
        }
    }
}

// ---------------------------------------------------------------------------
// Hash / verify
// ---------------------------------------------------------------------------

/// Hashes `password` with a fresh random salt.
///
/// # Errors
///
/// - [`SealpostError::ConfigError`] if `params` are rejected by Argon2.
/// - [`SealpostError::InvalidInput`] if Argon2 rejects the password.
pub fn hash_password(password: &[u8], params: &Argon2Params) -> Result<PasswordDigest> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let hash = argon2id(password, &salt, params)?;
    Ok(PasswordDigest { salt, hash: *hash })
}

/// Checks `password` against a stored digest in constant time.
///
/// Returns `Ok(false)` on mismatch; errors only for unusable parameters.
pub fn verify_password(
    password: &[u8],
    digest: &PasswordDigest,
    params: &Argon2Params,
) -> Result<bool> {
    let candidate = argon2id(password, &digest.salt, params)?;
    Ok(candidate.as_slice().ct_eq(digest.hash.as_slice()).into())
}

fn argon2id(password: &[u8], salt: &[u8], params: &Argon2Params) -> Result<Zeroizing<[u8; 32]>> {
    let argon2_params = argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| SealpostError::ConfigError {
            reason: format!("invalid Argon2 parameters: {e}"),
        })?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password, salt, &mut output[..])
        .map_err(|e| SealpostError::InvalidInput {
            reason: format!("Argon2id hashing failed: {e}"),
        })?;

    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Light parameters suitable for fast unit tests.
    fn test_params() -> Argon2Params {
        Argon2Params {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }

    #[test]
    fn correct_password_verifies() -> std::result::Result<(), SealpostError> {
        let digest = hash_password(b"correct horse", &test_params())?;
        assert!(verify_password(b"correct horse", &digest, &test_params())?);
        Ok(())
    }

    #[test]
    fn wrong_password_does_not_verify() -> std::result::Result<(), SealpostError> {
        let digest = hash_password(b"correct horse", &test_params())?;
        assert!(!verify_password(b"wrongpass", &digest, &test_params())?);
        Ok(())
    }

    #[test]
    fn same_password_gets_distinct_salts() -> std::result::Result<(), SealpostError> {
        let a = hash_password(b"pw", &test_params())?;
        let b = hash_password(b"pw", &test_params())?;
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        Ok(())
    }

    #[test]
    fn digest_never_contains_plaintext() -> std::result::Result<(), SealpostError> {
        let password = [0x41u8; 32];
        let digest = hash_password(&password, &test_params())?;
        assert_ne!(digest.hash, password);
        Ok(())
    }

    #[test]
    fn zero_t_cost_rejected() {
        let params = Argon2Params {
            t_cost: 0,
            ..test_params()
        };
        let result = hash_password(b"pw", &params);
        assert!(matches!(result, Err(SealpostError::ConfigError { .. })));
    }

    #[test]
    fn params_follow_config() {
        let config = AppConfig {
            argon2_m_cost: 1024,
            argon2_t_cost: 2,
            argon2_p_cost: 1,
            ..AppConfig::default()
        };
        let params = Argon2Params::from(&config);
        assert_eq!(params.m_cost, 1024);
        assert_eq!(params.t_cost, 2);
    }
}
