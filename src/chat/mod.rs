//! Partner matching and chat sessions.
//!
//! [`ChatService`] is the entry point for the transport layers. It owns the
//! connection pool, runs each operation in its own transaction and re-runs
//! match attempts that lost a race against another writer.

pub mod error;
pub mod lifecycle;
pub mod matcher;
pub mod preferences;
pub mod relay;

pub use error::{ChatError, ErrorKind};
pub use matcher::MatchOutcome;
pub use preferences::{AgeRange, PreferenceError, Preferences};
pub use relay::{Payload, PayloadKind, RelayOutcome};

use backon::{ConstantBuilder, Retryable};
use rusqlite::Connection;
use std::sync::Arc;

use crate::core::config;
use crate::storage::db::{self, DbPool};
use crate::storage::users;

#[derive(Clone)]
pub struct ChatService {
    pool: Arc<DbPool>,
}

impl ChatService {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Searches a partner for `user_id` using an explicit preference string.
    pub async fn find_and_match(&self, user_id: i64, preferences: &str) -> Result<MatchOutcome, ChatError> {
        let preferences: Preferences = preferences.parse()?;
        self.match_with(user_id, &preferences).await
    }

    /// Searches a partner using the preferences stored on the user's profile.
    pub async fn search(&self, user_id: i64) -> Result<MatchOutcome, ChatError> {
        let user = {
            let conn = db::get_connection(&self.pool)?;
            users::get_user(&conn, user_id)?.ok_or(ChatError::UserNotFound(user_id))?
        };
        let raw = user
            .preferences
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ChatError::PreferencesMissing(user_id))?;

        self.find_and_match(user_id, raw).await
    }

    /// Ends the user's chat; returns the partner to notify.
    pub async fn end_chat(&self, user_id: i64) -> Result<Option<i64>, ChatError> {
        self.with_retry("end_chat", user_id, |conn| lifecycle::end_chat(conn, user_id))
            .await
    }

    /// Leaves the waiting queue; returns whether the user was waiting.
    pub async fn cancel_waiting(&self, user_id: i64) -> Result<bool, ChatError> {
        self.with_retry("cancel_waiting", user_id, |conn| lifecycle::cancel_waiting(conn, user_id))
            .await
    }

    /// Current chat partner of `user_id`, if any.
    pub fn partner_of(&self, user_id: i64) -> Result<Option<i64>, ChatError> {
        let conn = db::get_connection(&self.pool)?;
        relay::partner_of(&conn, user_id)
    }

    pub fn relay(&self, sender_id: i64, payload: Payload) -> Result<RelayOutcome, ChatError> {
        let conn = db::get_connection(&self.pool)?;
        relay::relay(&conn, sender_id, payload)
    }

    async fn match_with(&self, user_id: i64, preferences: &Preferences) -> Result<MatchOutcome, ChatError> {
        self.with_retry("find_and_match", user_id, |conn| {
            matcher::try_match(conn, user_id, preferences)
        })
        .await
    }

    /// Runs `operation` on a pooled connection, re-running it from scratch
    /// on [`ChatError::StorageConflict`] up to `MATCH_MAX_RETRIES` times.
    async fn with_retry<T, F>(&self, name: &str, user_id: i64, operation: F) -> Result<T, ChatError>
    where
        F: Fn(&mut Connection) -> Result<T, ChatError> + Sync,
        T: Send,
    {
        let pool = &self.pool;
        let operation = &operation;
        let attempt = move || async move {
            let mut conn = db::get_connection(pool)?;
            operation(&mut conn)
        };

        attempt
            .retry(
                ConstantBuilder::default()
                    .with_delay(config::matching::retry_delay())
                    .with_max_times(*config::matching::MAX_RETRIES),
            )
            .when(ChatError::is_retryable)
            .notify(|err, delay| {
                log::warn!("{} for user {} raced: {}, retrying in {:?}", name, user_id, err, delay);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool_with_size;
    use crate::storage::users::{create_user, update_user, UserUpdate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> (tempfile::TempDir, Arc<DbPool>, ChatService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.sqlite");
        let pool = Arc::new(create_pool_with_size(path.to_str().unwrap(), 4).unwrap());
        (dir, Arc::clone(&pool), ChatService::new(pool))
    }

    #[tokio::test]
    async fn test_search_requires_profile_and_preferences() {
        let (_dir, pool, service) = service();
        assert!(matches!(service.search(1).await, Err(ChatError::UserNotFound(1))));

        {
            let conn = pool.get().unwrap();
            create_user(&conn, 1, "A", None).unwrap();
        }
        assert!(matches!(service.search(1).await, Err(ChatError::PreferencesMissing(1))));

        {
            let conn = pool.get().unwrap();
            let update = UserUpdate {
                preferences: Some("f/30-20/any".to_string()),
                ..Default::default()
            };
            update_user(&conn, 1, &update).unwrap();
        }
        assert!(matches!(service.search(1).await, Err(ChatError::InvalidPreferences(_))));
    }

    #[tokio::test]
    async fn test_find_and_match_rejects_bad_preference_string() {
        let (_dir, _pool, service) = service();
        let err = service.find_and_match(1, "female-25").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_search_uses_stored_preferences() {
        let (_dir, pool, service) = service();
        {
            let conn = pool.get().unwrap();
            for id in [1, 2] {
                create_user(&conn, id, "user", None).unwrap();
                let update = UserUpdate {
                    preferences: Some("any/any/any".to_string()),
                    ..Default::default()
                };
                update_user(&conn, id, &update).unwrap();
            }
        }

        assert_eq!(service.search(1).await.unwrap(), MatchOutcome::Enqueued);
        assert!(matches!(service.search(2).await.unwrap(), MatchOutcome::Matched(u) if u.id == 1));
        assert_eq!(service.end_chat(1).await.unwrap(), Some(2));
        assert!(!service.cancel_waiting(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_conflict_is_retried_then_surfaced() {
        let (_dir, _pool, service) = service();
        let attempts = AtomicUsize::new(0);

        let err = service
            .with_retry("find_and_match", 1, |_conn| -> Result<(), ChatError> {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ChatError::StorageConflict)
            })
            .await
            .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), *config::matching::MAX_RETRIES + 1);
        assert_eq!(err.kind(), ErrorKind::StorageConflict);
        assert!(err.user_message().contains("busy"));
    }

    #[tokio::test]
    async fn test_conflict_then_success() {
        let (_dir, _pool, service) = service();
        let attempts = AtomicUsize::new(0);

        let value = service
            .with_retry("end_chat", 1, |_conn| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ChatError::StorageConflict)
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let (_dir, _pool, service) = service();
        let attempts = AtomicUsize::new(0);

        let err = service
            .with_retry("end_chat", 1, |_conn| -> Result<(), ChatError> {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ChatError::UserNotFound(1))
            })
            .await
            .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
