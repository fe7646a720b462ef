use rusqlite::ErrorCode;
use thiserror::Error;

use super::preferences::PreferenceError;

/// Errors of the matching / session core.
///
/// "Already matched" and "already waiting" are not errors; they come back as
/// [`super::MatchOutcome`] values.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("user {0} has not set matching preferences")]
    PreferencesMissing(i64),

    #[error("invalid preferences: {0}")]
    InvalidPreferences(#[from] PreferenceError),

    /// The store contradicts the pairing invariants
    #[error("session consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A concurrent writer won the race; the operation may be re-run
    #[error("concurrent session update")]
    StorageConflict,

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),
}

/// Coarse classification used for logging and user replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ConsistencyViolation,
    StorageConflict,
    Internal,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) | Self::PreferencesMissing(_) => ErrorKind::NotFound,
            Self::InvalidPreferences(_) => ErrorKind::InvalidInput,
            Self::ConsistencyViolation(_) | Self::InvalidTransition { .. } => ErrorKind::ConsistencyViolation,
            Self::StorageConflict => ErrorKind::StorageConflict,
            Self::Database(_) | Self::DatabasePool(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the whole operation from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageConflict)
    }

    /// Text shown to the Telegram user for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "No account data found. Please send /start to register first.",
            Self::PreferencesMissing(_) => "You need to set your preferences before searching for a partner.",
            Self::InvalidPreferences(_) => {
                "Your preferences look invalid. Please update them in the web app (format: gender/min-max/city)."
            }
            Self::StorageConflict => "The bot is busy right now. Please try again in a moment.",
            Self::ConsistencyViolation(_)
            | Self::InvalidTransition { .. }
            | Self::Database(_)
            | Self::DatabasePool(_) => "An error occurred. Please try again later.",
        }
    }

    /// Logs the error at a level matching its kind.
    pub fn log(&self, operation: &str, user_id: i64) {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::InvalidInput => {
                log::info!("{} for user {}: {}", operation, user_id, self)
            }
            ErrorKind::StorageConflict => log::warn!("{} for user {} gave up: {}", operation, user_id, self),
            ErrorKind::ConsistencyViolation => {
                log::error!("BUG: {} for user {} hit inconsistent session state: {}", operation, user_id, self)
            }
            ErrorKind::Internal => log::error!("{} for user {} failed: {}", operation, user_id, self),
        }
    }
}

impl From<rusqlite::Error> for ChatError {
    /// Lock contention and unique-index collisions mean another writer got
    /// there first; other constraint failures mean the data is wrong.
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return Self::StorageConflict,
                ErrorCode::ConstraintViolation => {
                    return match failure.extended_code {
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                            Self::StorageConflict
                        }
                        _ => Self::ConsistencyViolation(err.to_string()),
                    };
                }
                _ => {}
            }
        }
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_maps_to_conflict() {
        let err: ChatError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY).into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::StorageConflict);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err: ChatError = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE).into();
        assert!(matches!(err, ChatError::StorageConflict));
    }

    #[test]
    fn test_check_violation_is_consistency_error() {
        let err: ChatError = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT_CHECK).into();
        assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err: ChatError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.user_message(), "An error occurred. Please try again later.");
    }

    #[test]
    fn test_not_found_messages_guide_the_user() {
        assert_eq!(ChatError::UserNotFound(1).kind(), ErrorKind::NotFound);
        assert!(ChatError::PreferencesMissing(1).user_message().contains("preferences"));
    }
}
