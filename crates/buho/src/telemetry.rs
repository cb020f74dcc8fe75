//! Log output setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a formatted subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when `RUST_LOG` is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed, which
/// leaves the existing one in place.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).try_init().is_ok()
}
