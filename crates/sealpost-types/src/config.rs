//! Application configuration with sensible defaults.
//!
//! All operational parameters are centralized here. Every value has a
//! documented default; a JSON file may override any subset of them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SealpostError};

/// Smallest Argon2 memory cost accepted, in KiB.
const MIN_ARGON2_M_COST: u32 = 8;

/// Global application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Argon2id memory cost for password hashing, in KiB.
    pub argon2_m_cost: u32,

    /// Argon2id number of passes.
    pub argon2_t_cost: u32,

    /// Argon2id degree of parallelism.
    pub argon2_p_cost: u32,

    /// Upper bound applied to every message listing `limit`.
    pub max_page_size: usize,

    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            argon2_m_cost: 65_536, // 64 MiB
            argon2_t_cost: 3,
            argon2_p_cost: 1,
            max_page_size: 100,
            log_level: "info".into(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a JSON file and validates it.
    ///
    /// Fields missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// [`SealpostError::ConfigError`] if the file cannot be read, is not
    /// valid JSON, or fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SealpostError::ConfigError {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| SealpostError::ConfigError {
            reason: format!("invalid config JSON: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.argon2_t_cost == 0 {
            return Err(SealpostError::ConfigError {
                reason: "argon2_t_cost must be greater than 0".into(),
            });
        }

        if self.argon2_p_cost == 0 {
            return Err(SealpostError::ConfigError {
                reason: "argon2_p_cost must be greater than 0".into(),
            });
        }

        if self.argon2_m_cost < MIN_ARGON2_M_COST * self.argon2_p_cost {
            return Err(SealpostError::ConfigError {
                reason: format!(
                    "argon2_m_cost must be at least {} KiB for p_cost {}",
                    MIN_ARGON2_M_COST * self.argon2_p_cost,
                    self.argon2_p_cost
                ),
            });
        }

        if self.max_page_size == 0 {
            return Err(SealpostError::ConfigError {
                reason: "max_page_size must be greater than 0".into(),
            });
        }

        if self.log_level.trim().is_empty() {
            return Err(SealpostError::ConfigError {
                reason: "log_level must not be empty".into(),
            });
        }

        Ok(())
    }
}
