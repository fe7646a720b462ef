//! Configuration read from the environment.
//!
//! Every value is read once, on first access. `.env` is loaded by `main`
//! before anything here is touched.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: randtalk.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "randtalk.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Log level (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Webhook URL for Telegram updates (full URL, path included)
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Port of the HTTP server (web API, and the webhook route in webhook mode)
/// Read from PORT environment variable
/// Default: 10000
pub static PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(10000)
});

/// Maximum number of pooled SQLite connections
/// Read from DB_POOL_SIZE environment variable
/// Default: 10
pub static DB_POOL_SIZE: Lazy<u32> = Lazy::new(|| {
    env::var("DB_POOL_SIZE")
        .ok()
        .and_then(|p| p.parse().ok())
        .filter(|size| *size > 0)
        .unwrap_or(10)
});

/// Database connection configuration
pub mod database {
    use super::Duration;

    /// How long a connection waits on a locked database before giving up (in seconds)
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    /// Busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

/// Partner matching configuration
pub mod matching {
    use once_cell::sync::Lazy;
    use std::env;
    use std::time::Duration;

    /// How many times a match attempt is re-run after a concurrent update
    /// Read from MATCH_MAX_RETRIES environment variable
    /// Default: 3
    pub static MAX_RETRIES: Lazy<usize> = Lazy::new(|| {
        env::var("MATCH_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    });

    /// Delay between match attempts (in milliseconds)
    pub const RETRY_DELAY_MS: u64 = 25;

    /// Retry delay duration
    pub fn retry_delay() -> Duration {
        Duration::from_millis(RETRY_DELAY_MS)
    }
}

/// Companion web app configuration
pub mod webapp {
    use once_cell::sync::Lazy;
    use std::env;

    /// Base URL of the registration web app; the user id is appended as a path segment
    /// Read from WEBAPP_URL environment variable
    pub static URL: Lazy<String> =
        Lazy::new(|| env::var("WEBAPP_URL").unwrap_or_else(|_| "https://randtalk-18e41.web.app".to_string()));

    /// Allowed CORS origins (comma-separated, `*` for any)
    /// Read from CORS_ORIGINS environment variable
    pub static CORS_ORIGINS: Lazy<Vec<String>> = Lazy::new(|| {
        env::var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| vec![URL.clone(), "http://localhost:3000".to_string()])
    });

    /// Whether profile endpoints require Telegram init data
    /// Read from WEBAPP_AUTH_REQUIRED environment variable
    /// Default: true
    pub static AUTH_REQUIRED: Lazy<bool> = Lazy::new(|| {
        env::var("WEBAPP_AUTH_REQUIRED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true)
    });

    /// Maximum age of Telegram init data (in seconds)
    /// Read from WEBAPP_AUTH_MAX_AGE_SECS environment variable
    /// Default: 300
    pub static AUTH_MAX_AGE_SECS: Lazy<i64> = Lazy::new(|| {
        env::var("WEBAPP_AUTH_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300)
    });

    pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Registration link for a given user
    pub fn registration_url(user_id: i64) -> String {
        format!("{}/{}", URL.trim_end_matches('/'), user_id)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}
