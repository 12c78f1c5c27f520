//! Logging initialization for the chat client.
//!
//! Thin wrapper over the observability crate. Library crates only emit
//! `tracing` events; the embedding application calls [`init_logging`] once.

use crate::Paths;
use observability::LogConfig;

/// Service name written into every log line.
pub const SERVICE_NAME: &str = "chat-pro";

/// Initialize logging for the chat client.
///
/// `RUST_LOG` wins over `level` when set. When `paths` is given, JSONL
/// records are appended to `paths.log_file()` and stderr output is kept.
/// Returns whether this call installed the global subscriber.
///
/// ```ignore
/// let config = Config::load(&paths)?;
/// init_logging(&config.log_level, Some(&paths));
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: &str, paths: Option<&Paths>) -> bool {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr: true,
    })
}
