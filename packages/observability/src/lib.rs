//! # Observability
//!
//! Tracing setup shared by the chat core crates.
//!
//! Library crates never install a subscriber. They log through the `tracing`
//! macros and leave the sink to whoever embeds them. The embedding
//! application calls [`init`] or [`init_with_config`] once at startup.
//!
//! Two output shapes are supported:
//!
//! - compact human-readable lines on stderr (default)
//! - one JSON object per line appended to a file, when [`LogConfig::log_path`]
//!   is set (`tail -f ~/.chat-pro/logs/client.jsonl | jq`)
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "chat-pro".into(),
//!     default_level: "debug".into(),
//!     log_path: Some(observability::default_log_path()),
//!     ..Default::default()
//! });
//! ```

mod file;
mod json_layer;

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file::JsonlFileWriter;
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSON log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info,identity_store=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Append JSONL records to this file. `None` logs to stderr only.
    pub log_path: Option<PathBuf>,

    /// Keep the stderr output even when a log file is configured.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default JSONL location: `~/.chat-pro/logs/client.jsonl`.
///
/// Falls back to the working directory when no home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chat-pro")
        .join("logs")
        .join("client.jsonl")
}

/// Initialize logging with default settings for `service_name`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(service_name: &str) -> bool {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with a custom configuration.
///
/// Safe to call more than once; only the first successful call installs a
/// subscriber. Returns whether this call installed it. If the log file cannot
/// be opened the subscriber falls back to stderr and reports the problem.
pub fn init_with_config(config: LogConfig) -> bool {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let mut file_error = None;
    let json_layer = match &config.log_path {
        Some(path) => match JsonlFileWriter::open(path) {
            Ok(writer) => {
                Some(JsonLayer::new(config.service_name.clone(), writer).with_filter(filter()))
            }
            Err(e) => {
                file_error = Some(format!("{}: {}", path.display(), e));
                None
            }
        },
        None => None,
    };

    let stderr_layer = if json_layer.is_none() || config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        if let Some(err) = file_error {
            tracing::warn!(error = %err, "log file unavailable, logging to stderr");
        }
        tracing::debug!(service = %config.service_name, "observability initialized");
    }

    installed
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }

    #[test]
    fn test_default_log_path_layout() {
        let path = default_log_path();
        assert!(path.ends_with(".chat-pro/logs/client.jsonl"));
    }

    #[test]
    fn test_second_init_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        init_with_config(LogConfig {
            service_name: "observability-test".into(),
            log_path: Some(dir.path().join("test.jsonl")),
            ..Default::default()
        });
        // Whichever call won, a global subscriber now exists.
        assert!(!init("observability-test"));
    }
}
