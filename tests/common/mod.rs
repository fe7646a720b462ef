//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::sync::Arc;

use randtalk::storage::db::create_pool_with_size;
use randtalk::storage::users::{self, UserUpdate};
use randtalk::storage::{get_connection, DbPool};

/// Temporary on-disk database with migrations applied.
///
/// The directory is removed when the value is dropped.
pub struct TestDb {
    _dir: tempfile::TempDir,
    pub pool: Arc<DbPool>,
}

impl TestDb {
    pub fn new(pool_size: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("randtalk-test.sqlite");
        let pool = create_pool_with_size(path.to_str().unwrap(), pool_size).unwrap();
        Self {
            _dir: dir,
            pool: Arc::new(pool),
        }
    }

    /// Registers a user with the given profile fields.
    pub fn add_user(&self, id: i64, name: &str, gender: Option<&str>, age: Option<u32>, city: Option<&str>) {
        let conn = get_connection(&self.pool).unwrap();
        users::create_user(&conn, id, name, None).unwrap();
        let update = UserUpdate {
            gender: gender.map(str::to_string),
            age,
            city: city.map(str::to_string),
            ..Default::default()
        };
        if !update.is_empty() {
            users::update_user(&conn, id, &update).unwrap();
        }
    }

    pub fn set_preferences(&self, id: i64, preferences: &str) {
        let conn = get_connection(&self.pool).unwrap();
        let update = UserUpdate {
            preferences: Some(preferences.to_string()),
            ..Default::default()
        };
        assert!(users::update_user(&conn, id, &update).unwrap());
    }
}

/// Private-chat message JSON as Telegram sends it, with `extra` merged in.
pub fn create_message_json(user_id: i64, extra: serde_json::Value) -> String {
    let mut message = serde_json::json!({
        "message_id": 1,
        "date": 1234567890,
        "chat": {
            "id": user_id,
            "type": "private",
            "first_name": "Test"
        },
        "from": {
            "id": user_id,
            "is_bot": false,
            "first_name": "Test",
            "username": "testuser"
        }
    });
    if let (Some(message), Some(extra)) = (message.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            message.insert(key.clone(), value.clone());
        }
    }
    message.to_string()
}
