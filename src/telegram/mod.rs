//! Telegram bot integration, handlers and the companion web API

pub mod bot;
pub mod handlers;
pub mod keyboards;
pub mod webapp;
pub mod webapp_auth;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Bot, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use webapp::{create_webapp_router, run_webapp_server, WebAppState};
