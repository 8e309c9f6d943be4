//! Log output setup for the `refindex` binary.
//!
//! `RUST_LOG` takes precedence over the level chosen here, so
//! `RUST_LOG=refindex::graph=debug` shows each step of a reference walk.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The default level if `RUST_LOG` is not set.
    pub default_level: Level,
    /// Whether to print the event target (module path).
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Debug-level output with targets, for `--verbose`.
    pub fn verbose() -> Self {
        Self {
            default_level: Level::DEBUG,
            with_target: true,
        }
    }

    /// Builds the filter, preferring `RUST_LOG` when it is set and valid.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_level.as_str().to_lowercase()))
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.with_target),
        )
        .try_init()
        .is_ok()
}
