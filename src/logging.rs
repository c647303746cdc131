// File: src/logging.rs
//! Logging setup for the command-line tool.
//!
//! stdout is reserved for command output; all log events go to stderr.
//! Level resolution: `--log-level` flag → `SNIFFLE_LOG` → `RUST_LOG` → warn.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG: &str = "SNIFFLE_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Builds the event filter from an explicit level or the environment.
pub fn build_filter(cli_level: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(cli_level: Option<&str>) {
    let use_ansi = std::io::stderr().is_terminal();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(use_ansi);

    let _ = tracing_subscriber::registry()
        .with(build_filter(cli_level))
        .with(fmt_layer)
        .try_init();
}
