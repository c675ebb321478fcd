// Structured logging setup
// Lifecycle events go through `tracing`; binaries embedding the crate call
// `init_logging` once at startup.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for development
    Pretty,
    /// One JSON object per line, for log aggregation
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON, anything else pretty
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` filters, default `info`.
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .try_init()
            .is_ok(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
            .try_init()
            .is_ok(),
    }
}
