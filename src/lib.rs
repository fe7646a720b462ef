//! Randtalk - anonymous partner-matching Telegram bot
//!
//! Users register through the bot and a companion web app, then get paired
//! with a stranger whose profile fits their preferences. Messages are
//! relayed between the two until one of them ends the chat.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors and logging
//! - `storage`: SQLite pool, migrations, the user directory and the session store
//! - `chat`: Matching, chat lifecycle and message relay
//! - `telegram`: Bot handlers and the web API

pub mod chat;
pub mod cli;
pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use chat::{ChatError, ChatService, MatchOutcome, Preferences};
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, HandlerDeps};
