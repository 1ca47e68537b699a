//! # Structured Logging
//!
//! `tracing` subscriber setup for the custody node. The output format is
//! chosen at startup via `--log-format`, the filter comes from `RUST_LOG`
//! with a node-supplied default, and every log line goes to stderr so that
//! stdout stays clean for subcommand output (`init`, `status`, `version`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format, selected by `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for a terminal session.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitive. Unrecognized values fall
    /// back to `Pretty` rather than failing startup over a typo.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global tracing subscriber. Call once, before the first log
/// line; a second call panics.
///
/// `default_directives` is the filter applied when `RUST_LOG` is unset,
/// e.g. `"vuna_node=info,vuna_engine=info"`. Setting `RUST_LOG` replaces
/// it entirely:
///
/// ```text
/// RUST_LOG=vuna_node=debug,vuna_engine=trace vuna-node run
/// ```
pub fn init_logging(default_directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .init(),
    }

    tracing::debug!(?format, "logging initialized");
}
