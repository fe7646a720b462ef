//! Inline menu and its callbacks

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::types::{load_user, HandlerDeps, HandlerError};
use crate::telegram::keyboards::{self, CALLBACK_EDIT_PREFERENCES, CALLBACK_MY_POINTS};
use crate::telegram::Bot;

/// "Menu" button
pub(super) async fn show_menu(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, "Menu:\nChoose an option:")
        .reply_markup(keyboards::menu_keyboard())
        .await?;
    Ok(())
}

/// Text shown for a menu callback.
pub(super) fn menu_reply(data: &str, points: impl FnOnce() -> u32) -> String {
    match data {
        CALLBACK_MY_POINTS => format!("You have {} points.", points()),
        CALLBACK_EDIT_PREFERENCES => {
            "To edit your preferences, use the web app or send /start to update your info.".to_string()
        }
        _ => "Unknown menu option.".to_string(),
    }
}

pub(super) async fn handle_menu_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = i64::try_from(q.from.id.0)?;
    let data = q.data.as_deref().unwrap_or_default();

    let text = menu_reply(data, || {
        load_user(&deps.db_pool, user_id)
            .map(|user| user.points)
            .unwrap_or(0)
    });

    bot.answer_callback_query(q.id.clone()).await?;

    match q.message.as_ref() {
        Some(message) => {
            bot.edit_message_text(message.chat().id, message.id(), text).await?;
        }
        None => {
            bot.send_message(ChatId(user_id), text).await?;
        }
    }

    Ok(())
}
