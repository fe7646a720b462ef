use thiserror::Error;

use crate::chat::ChatError;

/// Centralized error type for the bot and web layers
///
/// Chat-core errors travel as [`ChatError`] and are wrapped here only when
/// they cross into transport code. Uses `thiserror` for automatic error
/// conversion and display formatting.
///
/// # Example
///
/// ```no_run
/// use randtalk::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Matching / session errors
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_wraps_with_context() {
        let err: AppError = ChatError::UserNotFound(42).into();
        assert!(matches!(err, AppError::Chat(ChatError::UserNotFound(42))));
        assert_eq!(err.to_string(), "Chat error: user 42 not found");
    }

    #[test]
    fn test_validation_display() {
        let err = AppError::Validation("age must be positive".to_string());
        assert_eq!(err.to_string(), "Validation error: age must be positive");
    }
}
