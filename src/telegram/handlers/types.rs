//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::Message;

use crate::chat::ChatService;
use crate::storage::db::{get_connection, DbPool};
use crate::storage::users::{self, User};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub chat: ChatService,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        let chat = ChatService::new(Arc::clone(&db_pool));
        Self { db_pool, chat }
    }
}

/// Sender of a message as a Telegram user id.
///
/// Falls back to the chat id, which is the same value in private chats.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(msg.chat.id.0)
}

/// Profile lookup for reply text. Pool and query errors are logged and read
/// as a missing profile.
pub fn load_user(pool: &DbPool, user_id: i64) -> Option<User> {
    let conn = match get_connection(pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("No connection to load user {}: {}", user_id, e);
            return None;
        }
    };
    match users::get_user(&conn, user_id) {
        Ok(user) => user,
        Err(e) => {
            log::warn!("Failed to load user {}: {}", user_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool_with_size;
    use crate::storage::users::create_user;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;
    use tempfile::TempDir;

    #[test]
    fn test_load_user() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handlers.sqlite");
        let pool = create_pool_with_size(path.to_str().unwrap(), 2).unwrap();
        create_user(&pool.get().unwrap(), 1, "Ann", None).unwrap();

        assert_eq!(load_user(&pool, 1).map(|u| u.name), Some("Ann".to_string()));
        assert!(load_user(&pool, 2).is_none());
    }

    #[test]
    fn test_load_user_query_error_is_missing_profile() {
        // No migrations: the users table does not exist.
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .unwrap();
        assert!(load_user(&pool, 1).is_none());
    }
}
