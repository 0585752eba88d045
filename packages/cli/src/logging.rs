// ABOUTME: Tracing subscriber setup for the beacon binary
// ABOUTME: Filter comes from BEACON_LOG, then RUST_LOG, then a quiet default

use beacon_config::constants::{BEACON_LOG, RUST_LOG};
use beacon_config::parse_env_with_fallback;
use tracing_subscriber::EnvFilter;

/// Used when neither log variable is set
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Filter directive for this run; `verbose` wins over the environment
pub fn log_filter_directive(verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    parse_env_with_fallback(BEACON_LOG, RUST_LOG, DEFAULT_LOG_FILTER.to_string())
}

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub fn init_logging(verbose: bool) {
    let directive = log_filter_directive(verbose);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter '{}': {}", directive, e);
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
