// Tracing subscriber setup for the `melody` binary.
//
// The library only emits `tracing` events; installing a subscriber is the
// binary's job. `RUST_LOG` wins over the level passed in, so a single module
// can be turned up (`RUST_LOG=melody_codec::generator=debug`) without
// touching flags.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Output format, selectable with `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines on stderr.
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    // Already initialised (e.g. by a test harness).
    let _ = result;
}
