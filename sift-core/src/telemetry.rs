//! Tracing setup helpers.
//!
//! The library itself never installs a global subscriber; stage functions
//! only emit events. Binaries and tests opt in through these helpers.

use tracing_subscriber::EnvFilter;

/// Install a subscriber honoring `SIFT_LOG` (falling back to `warn`).
/// Safe to call repeatedly; only the first call wins.
pub fn init() {
    let filter = EnvFilter::try_from_env("SIFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Test helper: verbose output when a test run sets `SIFT_LOG`.
pub fn init_for_tests() {
    init();
}
