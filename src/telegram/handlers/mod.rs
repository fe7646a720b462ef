//! Telegram bot handler tree configuration
//!
//! The same schema is used by the dispatcher in polling and webhook mode.

mod chat;
mod commands;
mod menu;
mod schema;
mod types;

pub use chat::{deliver, payload_from_message};
pub use schema::schema;
pub use types::{sender_id, HandlerDeps, HandlerError};
