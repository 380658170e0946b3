//! Log sink setup for processes hosting the event bus.

/// Initialize process-wide logging with `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber configuration (filters, formats).
pub mod tracing;

pub use self::tracing::{init_pretty, init_with_filter};
