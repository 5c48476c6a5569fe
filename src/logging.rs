//! Tracing subscriber setup shared by both binaries

use tracing_subscriber::EnvFilter;

/// Initialize logging with environment filter
///
/// Use RUST_LOG env var to control log level,
/// e.g. RUST_LOG=debug or RUST_LOG=line_chat=trace.
/// Logs go to stderr so chat output on stdout stays readable.
pub fn init(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}
