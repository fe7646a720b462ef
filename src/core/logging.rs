//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::str::FromStr;

use crate::core::config;

/// Parses a level name, falling back to `Info` for anything unknown
pub fn parse_level(raw: &str) -> LevelFilter {
    LevelFilter::from_str(raw.trim()).unwrap_or(LevelFilter::Info)
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level name, e.g. "info" or "debug"
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the log file or install the logger
pub fn init_logger(log_file_path: &str, level: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = parse_level(level);

    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup
///
/// Secrets are never printed, only whether they are set.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::error!("BOT_TOKEN: not set (bot cannot start)");
    } else {
        log::info!("BOT_TOKEN: set");
    }

    log::info!("DATABASE_PATH: {}", *config::DATABASE_PATH);
    log::info!("DB_POOL_SIZE: {}", *config::DB_POOL_SIZE);
    log::info!("PORT: {}", *config::PORT);

    match config::WEBHOOK_URL.as_deref() {
        Some(url) => log::info!("WEBHOOK_URL: {}", url),
        None => log::info!("WEBHOOK_URL: not set (long polling only)"),
    }

    log::info!("WEBAPP_URL: {}", *config::webapp::URL);
    log::info!("CORS_ORIGINS: {}", config::webapp::CORS_ORIGINS.join(", "));
    if *config::webapp::AUTH_REQUIRED {
        log::info!(
            "Web API auth: required (init data max age {}s)",
            *config::webapp::AUTH_MAX_AGE_SECS
        );
    } else {
        log::warn!("Web API auth: DISABLED (WEBAPP_AUTH_REQUIRED=false), profiles are world-writable");
    }

    log::info!("MATCH_MAX_RETRIES: {}", *config::matching::MAX_RETRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_init_logger_fails_on_bad_path() {
        let file = NamedTempFile::new().unwrap();
        // A regular file cannot be used as a directory component
        let bad_path = file.path().join("nested.log");
        let result = init_logger(bad_path.to_str().unwrap(), "info");
        assert!(result.is_err());
    }
}
