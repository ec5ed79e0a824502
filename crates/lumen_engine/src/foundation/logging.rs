//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Reads the `RUST_LOG` environment variable for filtering. Safe to call from
/// examples and tests; calling twice panics in `env_logger`, so embedding
/// applications that configure their own logger should skip this.
pub fn init() {
    env_logger::init();
}
