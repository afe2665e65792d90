//! Tracing initialization for the CLI.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use velora_config::LogFormat;

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for the report.
pub fn init_tracing(level: &str, format: LogFormat) {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (text, json) = match format {
        LogFormat::Text => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init();
}
