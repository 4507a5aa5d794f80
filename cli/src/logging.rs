//! Diagnostic logging setup.
//!
//! Structured `tracing` events go to stderr so stdout stays reserved for
//! human or `--json` output.

use tracing_subscriber::EnvFilter;

/// Env var holding a filter directive; takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "PACO_LOG";

/// Default directive for a `-v` count.
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Filter from `PACO_LOG`, then `RUST_LOG`, then the `-v` default.
#[must_use]
pub fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbosity: u8, no_color: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && std::env::var("NO_COLOR").is_err())
        .with_target(false)
        .try_init();
}
