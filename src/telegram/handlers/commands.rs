//! Registration flow: /start, shared contacts and the "Start Chat" status check

use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::chat::ChatError;
use crate::storage::get_connection;
use crate::storage::sessions::{self, SessionState};
use crate::storage::users;
use crate::telegram::keyboards;
use crate::telegram::Bot;

/// Where a user stands when they send /start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StartState {
    /// First contact, profile just created
    NewUser,
    PhoneMissing,
    Incomplete,
    InChat,
    Waiting,
    Idle,
}

/// Registers unknown users and works out which prompt /start should show.
pub(super) fn resolve_start_state(
    conn: &Connection,
    user_id: i64,
    name: &str,
    username: Option<&str>,
) -> Result<StartState, ChatError> {
    let Some(user) = users::get_user(conn, user_id)? else {
        users::create_user(conn, user_id, name, username)?;
        log::info!("New user {} registered on /start", user_id);
        return Ok(StartState::NewUser);
    };

    if !user.has_phone() {
        return Ok(StartState::PhoneMissing);
    }
    if !user.is_complete() {
        return Ok(StartState::Incomplete);
    }

    if sessions::find_matched_involving(conn, user_id)?.is_some() {
        return Ok(StartState::InChat);
    }
    match sessions::session_of(conn, user_id)? {
        Some(session) if session.state == SessionState::Waiting => Ok(StartState::Waiting),
        _ => Ok(StartState::Idle),
    }
}

async fn send_registration_link(bot: &Bot, chat_id: ChatId, user_id: i64, text: &str) -> ResponseResult<()> {
    match keyboards::registration_keyboard(user_id) {
        Some(markup) => bot.send_message(chat_id, text).reply_markup(markup).await?,
        None => bot.send_message(chat_id, text).await?,
    };
    Ok(())
}

/// Handle /start command
pub(super) async fn handle_start_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    payload: &str,
) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;
    if !payload.is_empty() {
        log::debug!("/start from {} with payload {:?}", user_id, payload);
    }

    let name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "Anonymous".to_string());
    let username = msg.from.as_ref().and_then(|u| u.username.clone());

    let state = {
        let conn = get_connection(&deps.db_pool)?;
        resolve_start_state(&conn, user_id, &name, username.as_deref())?
    };

    match state {
        StartState::NewUser => {
            bot.send_message(chat_id, "Welcome! Please share your contact number to register.")
                .reply_markup(keyboards::share_contact_keyboard())
                .await?;
        }
        StartState::PhoneMissing => {
            bot.send_message(
                chat_id,
                "Your phone number is missing. Please share your contact number to complete your registration.",
            )
            .reply_markup(keyboards::share_contact_keyboard())
            .await?;
        }
        StartState::Incomplete => {
            send_registration_link(
                bot,
                chat_id,
                user_id,
                "Your account is incomplete. Please complete your registration using the integrated web app:",
            )
            .await?;
        }
        StartState::InChat => {
            bot.send_message(chat_id, "You are currently matched with a partner. You can end the chat.")
                .reply_markup(keyboards::in_chat_keyboard())
                .await?;
        }
        StartState::Waiting => {
            bot.send_message(chat_id, "You are in the waiting list. We will tell you when a partner is found.")
                .reply_markup(keyboards::waiting_keyboard())
                .await?;
        }
        StartState::Idle => {
            bot.send_message(chat_id, "Welcome back! Your account is complete. Enjoy using the bot!")
                .reply_markup(keyboards::main_keyboard())
                .await?;
        }
    }

    Ok(())
}

/// Stores the phone number from a shared contact.
///
/// Only the sender's own contact is accepted.
pub(super) async fn handle_contact(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(contact) = msg.contact() else {
        return Ok(());
    };
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    let owner = contact.user_id.and_then(|id| i64::try_from(id.0).ok());
    if owner != Some(user_id) {
        bot.send_message(chat_id, "Please share your own contact using the button below.")
            .reply_markup(keyboards::share_contact_keyboard())
            .await?;
        return Ok(());
    }

    let stored = {
        let conn = get_connection(&deps.db_pool)?;
        users::set_phone(&conn, user_id, &contact.phone_number)?
    };
    if !stored {
        bot.send_message(chat_id, ChatError::UserNotFound(user_id).user_message())
            .await?;
        return Ok(());
    }
    log::info!("User {} shared their phone number", user_id);

    bot.send_message(
        chat_id,
        "Thank you for sharing your phone number! Please complete your registration using the integrated web app.",
    )
    .await?;
    send_registration_link(bot, chat_id, user_id, "Click the button below to complete your registration:").await?;
    bot.send_message(chat_id, "You can now search for a partner!")
        .reply_markup(keyboards::main_keyboard())
        .await?;

    Ok(())
}

/// "Start Chat" button: reports how far the registration got.
pub(super) async fn handle_registration_status(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    let user = {
        let conn = get_connection(&deps.db_pool)?;
        users::get_user(&conn, user_id)?
    };

    match user {
        None => {
            bot.send_message(chat_id, ChatError::UserNotFound(user_id).user_message())
                .await?;
        }
        Some(user) if !user.has_phone() => {
            bot.send_message(
                chat_id,
                "Your phone number is missing. Please share your contact number to proceed.",
            )
            .reply_markup(keyboards::share_contact_keyboard())
            .await?;
        }
        Some(user) if !user.is_complete() => {
            send_registration_link(
                bot,
                chat_id,
                user_id,
                "Your registration is incomplete. Please complete it using the web app:",
            )
            .await?;
        }
        Some(_) => {
            bot.send_message(chat_id, "Your account is complete. You can now start chatting!")
                .reply_markup(keyboards::main_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::matcher::try_match;
    use crate::chat::Preferences;
    use crate::storage::migrations::run_migrations;
    use crate::storage::users::{AccountStatus, UserUpdate};

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn complete(conn: &Connection, id: i64) {
        users::create_user(conn, id, "user", None).unwrap();
        users::set_phone(conn, id, "+100").unwrap();
        let update = UserUpdate {
            account_status: Some(AccountStatus::Complete),
            ..Default::default()
        };
        users::update_user(conn, id, &update).unwrap();
    }

    #[test]
    fn test_registration_steps() {
        let conn = conn();
        assert_eq!(
            resolve_start_state(&conn, 1, "Alice", Some("alice")).unwrap(),
            StartState::NewUser
        );
        assert_eq!(resolve_start_state(&conn, 1, "Alice", None).unwrap(), StartState::PhoneMissing);

        users::set_phone(&conn, 1, "+4900").unwrap();
        assert_eq!(resolve_start_state(&conn, 1, "Alice", None).unwrap(), StartState::Incomplete);

        let update = UserUpdate {
            account_status: Some(AccountStatus::Complete),
            ..Default::default()
        };
        users::update_user(&conn, 1, &update).unwrap();
        assert_eq!(resolve_start_state(&conn, 1, "Alice", None).unwrap(), StartState::Idle);
    }

    #[test]
    fn test_session_states() {
        let mut conn = conn();
        complete(&conn, 1);
        complete(&conn, 2);

        try_match(&mut conn, 1, &Preferences::any()).unwrap();
        assert_eq!(resolve_start_state(&conn, 1, "u", None).unwrap(), StartState::Waiting);

        try_match(&mut conn, 2, &Preferences::any()).unwrap();
        assert_eq!(resolve_start_state(&conn, 1, "u", None).unwrap(), StartState::InChat);
        assert_eq!(resolve_start_state(&conn, 2, "u", None).unwrap(), StartState::InChat);
    }
}
