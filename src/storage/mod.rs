//! Database, User Directory and Session Store

pub mod db;
pub mod migrations;
pub mod sessions;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use sessions::{Session, SessionState};
pub use users::{AccountStatus, User, UserUpdate};
