use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use strum::{Display, EnumString};

use crate::core::error::{AppError, AppResult};

/// Deployment environment selected by `APP_ENV`.
///
/// Each environment owns its own database file so a dev bot never touches
/// production members or progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    Prod,
    Dev,
}

impl Environment {
    /// Default SQLite file for this environment
    pub fn default_database_path(self) -> &'static str {
        match self {
            Environment::Prod => "bookclub.sqlite",
            Environment::Dev => "bookclub_dev.sqlite",
        }
    }
}

/// Raw value of the environment selector.
/// Read from APP_ENV (falls back to ENV)
pub static APP_ENV: Lazy<Option<String>> = Lazy::new(|| {
    env::var("APP_ENV")
        .or_else(|_| env::var("ENV"))
        .ok()
        .filter(|value| !value.trim().is_empty())
});

/// Parses the environment selector.
///
/// A missing or unknown value is a startup misconfiguration: the bot refuses
/// to guess which database it should write to.
pub fn environment() -> AppResult<Environment> {
    parse_environment(APP_ENV.as_deref())
}

fn parse_environment(raw: Option<&str>) -> AppResult<Environment> {
    let raw = raw.ok_or_else(|| AppError::Config("APP_ENV is not set (expected 'prod' or 'dev')".to_string()))?;
    raw.trim()
        .parse::<Environment>()
        .map_err(|_| AppError::Config(format!("APP_ENV has unknown value '{}' (expected 'prod' or 'dev')", raw)))
}

/// Explicit database file path.
/// Read from DATABASE_PATH environment variable, overrides the per-environment default
pub static DATABASE_PATH: Lazy<Option<String>> = Lazy::new(|| env::var("DATABASE_PATH").ok());

/// Resolves the database path for the selected environment
pub fn database_path(environment: Environment) -> String {
    DATABASE_PATH
        .clone()
        .unwrap_or_else(|| environment.default_database_path().to_string())
}

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: bookclub.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "bookclub.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN, TELOXIDE_TOKEN or TELEGRAM_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .or_else(|_| env::var("TELEGRAM_TOKEN"))
        .unwrap_or_default()
});

/// Custom Bot API server URL (local Bot API server), if any
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Port of the liveness HTTP endpoint.
/// Read from PORT environment variable, default 8080
pub static PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080)
});

/// Who non-members should contact to join.
/// Read from ADMIN_CONTACT environment variable
pub static ADMIN_CONTACT: Lazy<String> =
    Lazy::new(|| env::var("ADMIN_CONTACT").unwrap_or_else(|_| "the club admin".to_string()));

/// Application version shown to admins in /help
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record Store configuration
pub mod storage {
    use super::Duration;

    /// Upper bound for a single Record Store call (in seconds)
    pub const TIMEOUT_SECS: u64 = 10;

    /// Maximum number of pooled SQLite connections
    pub const POOL_SIZE: u32 = 8;

    /// SQLite busy timeout (in seconds)
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    /// Record Store call timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    /// SQLite busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

/// Messaging Gateway configuration
pub mod delivery {
    use super::Duration;

    /// Upper bound for sending one reply (in seconds)
    pub const TIMEOUT_SECS: u64 = 30;

    /// Reply delivery timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Conversation housekeeping
pub mod conversation {
    use super::Duration;

    /// A flow untouched for this long is considered abandoned (in hours)
    pub const STALE_AFTER_HOURS: u64 = 24;

    /// Interval between abandoned-flow sweeps (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 600;

    /// Abandoned-flow age
    pub fn stale_after() -> Duration {
        Duration::from_secs(STALE_AFTER_HOURS * 60 * 60)
    }

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API HTTP requests (in seconds).
    /// Must exceed the long-polling timeout used by the dispatcher.
    pub const REQUEST_TIMEOUT_SECS: u64 = 90;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
