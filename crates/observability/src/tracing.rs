//! Tracing subscriber installation.
//!
//! The bus logs registration and dispatch records at `debug` and handler
//! failures at `error`, all with structured fields. Filtering happens here.

use tracing_subscriber::EnvFilter;

/// JSON logs, filter from `RUST_LOG`, falling back to `info`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::debug!("log sink installed");
    }
}

/// JSON logs with explicit filter directives (e.g. `"evbus_events=debug"`).
///
/// Invalid directives fall back to `info`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_with_filter(directives: &str) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Human-readable logs for demos and tests; captured by the test harness.
pub fn init_pretty(directives: &str) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
