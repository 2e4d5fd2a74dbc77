//! Logging initialization for the daemon.
//!
//! All gridd services log through `tracing`; this module wires up the
//! subscriber once per process. Output goes to stderr so foreground runs
//! show logs alongside the terminal.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system for the daemon.
///
/// Log level comes from `RUST_LOG` if set, otherwise the provided default.
/// Set `GRIDD_LOG_JSON=1` for structured JSON lines instead of plain fmt.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let json_output = std::env::var("GRIDD_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if json_output {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init (e.g. in tests) is not an error worth surfacing
    let _ = result;
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
