//! Configuration, filesystem paths, and logging bootstrap for the chat core.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_APP_ID, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SUPABASE_PUBLISHABLE_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, SERVICE_NAME};
pub use paths::Paths;
