//! Logging setup
//!
//! Everything goes to stderr; stdout carries JSON and the report.

use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

pub fn init(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
