//! Logging bootstrap
//!
//! The bridge is a library; it only installs a subscriber when the host
//! asks for one. `RUST_LOG` takes precedence over the configured filter.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a compact `tracing` subscriber.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_logging(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
