//! `tracing` subscriber setup for the CLI.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber, writing to stderr.
///
/// Precedence: `--verbose`, then `RUST_LOG`, then the config `[log] filter`,
/// then [`DEFAULT_FILTER`].
pub fn init_tracing(verbose: bool, config_filter: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_FILTER))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        })
    };
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .try_init();
}
