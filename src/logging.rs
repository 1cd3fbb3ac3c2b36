//! Logging configuration for pgscope.
//!
//! Diagnostic output goes to stdout, so logs go to stderr where they can
//! be captured separately.

use tracing_subscriber::EnvFilter;

/// Initializes logging to stderr, honoring `RUST_LOG`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
