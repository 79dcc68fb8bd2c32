//! Tracing subscriber setup.

use std::sync::Mutex;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Filter directive for the crate given `-v` count, `-q` and the configured level
pub fn filter_directive(verbosity: u8, quiet: bool, config: &LoggingConfig) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => config.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };
    format!("sekolah_export={}", level)
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the computed directive. Output goes to stderr through
/// a mutex so lines from concurrent workers never interleave.
pub fn init_logging(
    verbosity: u8,
    quiet: bool,
    config: &LoggingConfig,
) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| filter_directive(verbosity, quiet, config)),
    );
    let writer = Mutex::new(std::io::stderr());

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .try_init(),
    }
}
