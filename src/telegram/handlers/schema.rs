//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::chat::{handle_cancel_waiting, handle_end_chat, handle_relay, handle_search};
use super::commands::{handle_contact, handle_registration_status, handle_start_command};
use super::menu::{handle_menu_callback, show_menu};
use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::keyboards::ChatAction;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Branches are tried in order: commands, shared contacts, keyboard
/// buttons, callback queries, and finally the relay for everything else
/// that is not a command.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(contact_handler(deps.clone()))
        .branch(action_handler(deps.clone()))
        .branch(relay_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start(payload) => {
                        if let Err(e) = handle_start_command(&bot, &msg, &deps, &payload).await {
                            log::error!("/start failed for user {}: {}", sender_id(&msg), e);
                            let _ = bot
                                .send_message(msg.chat.id, "An error occurred. Please try again later.")
                                .await;
                        }
                    }
                }
                Ok(())
            }
        },
    ))
}

fn contact_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.contact().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_contact(&bot, &msg, &deps).await {
                    log::error!("Contact handler failed for user {}: {}", sender_id(&msg), e);
                    let _ = bot
                        .send_message(msg.chat.id, "An error occurred. Please try again later.")
                        .await;
                }
                Ok(())
            }
        })
}

fn action_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| msg.text().and_then(ChatAction::from_text))
        .endpoint(move |bot: Bot, msg: Message, action: ChatAction| {
            let deps = deps.clone();
            async move {
                log::debug!("Button {} pressed by user {}", action, sender_id(&msg));

                let result = match action {
                    ChatAction::StartChat => handle_registration_status(&bot, &msg, &deps).await,
                    ChatAction::SearchPartner => handle_search(&bot, &msg, &deps).await,
                    ChatAction::EndChat => handle_end_chat(&bot, &msg, &deps).await,
                    ChatAction::CancelWaiting => handle_cancel_waiting(&bot, &msg, &deps).await,
                    ChatAction::Menu => show_menu(&bot, &msg).await,
                };

                if let Err(e) = result {
                    log::error!("{} failed for user {}: {}", action, sender_id(&msg), e);
                    let _ = bot
                        .send_message(msg.chat.id, "An error occurred. Please try again later.")
                        .await;
                }
                Ok(())
            }
        })
}

fn relay_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| !msg.text().is_some_and(|text| text.starts_with('/')))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_relay(&bot, &msg, &deps).await {
                    log::error!("Relay failed for user {}: {}", sender_id(&msg), e);
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_menu_callback(&bot, &q, &deps).await {
                log::error!("Menu callback {:?} failed for user {}: {}", q.data, q.from.id, e);
            }
            Ok(())
        }
    })
}
