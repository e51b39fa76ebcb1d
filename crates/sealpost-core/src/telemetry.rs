//! `tracing` subscriber setup for hosts embedding Sealpost.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (usually
/// [`AppConfig::log_level`](sealpost_types::config::AppConfig::log_level))
/// is used. Returns `false` if a global subscriber was already
/// installed, which makes repeated calls harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .try_init()
        .is_ok()
}
