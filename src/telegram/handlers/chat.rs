//! Search, end chat, cancel waiting and message relay

use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, Message};

use super::types::{load_user, sender_id, HandlerDeps, HandlerError};
use crate::chat::{ChatError, MatchOutcome, Payload, PayloadKind, RelayOutcome};
use crate::telegram::keyboards;
use crate::telegram::Bot;

const UNSUPPORTED_MESSAGE: &str = "Unsupported message type. Only text, photos, videos, audio, voice, video notes, \
                                   stickers, and documents can be forwarded.";
const NOT_MATCHED_MESSAGE: &str = "You are not currently matched with any partner.";

/// "Search Partner" button
pub(super) async fn handle_search(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    let outcome = match deps.chat.search(user_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            e.log("search", user_id);
            bot.send_message(chat_id, e.user_message()).await?;
            return Ok(());
        }
    };

    match outcome {
        MatchOutcome::Matched(partner) => {
            let seeker_name = display_name(deps, user_id, msg);
            bot.send_message(
                chat_id,
                format!("You have been matched with {}! Start chatting now.", partner.name),
            )
            .reply_markup(keyboards::in_chat_keyboard())
            .await?;

            if let Err(e) = bot
                .send_message(
                    ChatId(partner.id),
                    format!("You have been matched with {}! Start chatting now.", seeker_name),
                )
                .reply_markup(keyboards::in_chat_keyboard())
                .await
            {
                log::warn!("Failed to notify user {} about match with {}: {}", partner.id, user_id, e);
            }
        }
        MatchOutcome::Enqueued => {
            bot.send_message(
                chat_id,
                "No match found at the moment. You have been added to the waiting list.",
            )
            .reply_markup(keyboards::waiting_keyboard())
            .await?;
        }
        MatchOutcome::AlreadyMatched => {
            bot.send_message(chat_id, "You are already matched with a partner. Start chatting with them!")
                .reply_markup(keyboards::in_chat_keyboard())
                .await?;
        }
        MatchOutcome::AlreadyWaiting => {
            bot.send_message(chat_id, "You are already in the waiting list. Please wait to be matched.")
                .reply_markup(keyboards::waiting_keyboard())
                .await?;
        }
    }

    Ok(())
}

/// Name shown to the partner, from the profile if possible
fn display_name(deps: &HandlerDeps, user_id: i64, msg: &Message) -> String {
    load_user(&deps.db_pool, user_id)
        .map(|user| user.name)
        .or_else(|| msg.from.as_ref().map(|u| u.first_name.clone()))
        .unwrap_or_else(|| "your partner".to_string())
}

/// "End Chat" button
pub(super) async fn handle_end_chat(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    match deps.chat.end_chat(user_id).await {
        Ok(Some(partner_id)) => {
            bot.send_message(
                chat_id,
                "The chat has been terminated. You can now search for a new partner.",
            )
            .reply_markup(keyboards::main_keyboard())
            .await?;

            if let Err(e) = bot
                .send_message(
                    ChatId(partner_id),
                    "The chat has been terminated by your partner. You can now search for a new partner.",
                )
                .reply_markup(keyboards::main_keyboard())
                .await
            {
                log::warn!("Failed to notify user {} that the chat ended: {}", partner_id, e);
            }
        }
        Ok(None) => {
            bot.send_message(chat_id, "You are not currently in an active chat.").await?;
        }
        Err(e) => {
            e.log("end_chat", user_id);
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }

    Ok(())
}

/// "Cancel Waiting" button
pub(super) async fn handle_cancel_waiting(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    match deps.chat.cancel_waiting(user_id).await {
        Ok(true) => {
            bot.send_message(
                chat_id,
                "You have been removed from the waiting list. You can now search for a partner again.",
            )
            .reply_markup(keyboards::main_keyboard())
            .await?;
        }
        Ok(false) => {
            bot.send_message(chat_id, "You are not currently in the waiting list.").await?;
        }
        Err(e) => {
            e.log("cancel_waiting", user_id);
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }

    Ok(())
}

/// Extracts the forwardable content of a message.
///
/// Returns `None` for kinds the relay does not carry (locations, polls, ...).
pub fn payload_from_message(msg: &Message) -> Option<Payload> {
    if let Some(text) = msg.text() {
        return Some(Payload::text(text));
    }

    let caption = msg.caption().map(str::to_string);
    let (kind, file_id) = if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        (PayloadKind::Photo, photo.file.id.to_string())
    } else if let Some(video) = msg.video() {
        (PayloadKind::Video, video.file.id.to_string())
    } else if let Some(document) = msg.document() {
        (PayloadKind::Document, document.file.id.to_string())
    } else if let Some(audio) = msg.audio() {
        (PayloadKind::Audio, audio.file.id.to_string())
    } else if let Some(voice) = msg.voice() {
        (PayloadKind::Voice, voice.file.id.to_string())
    } else if let Some(note) = msg.video_note() {
        (PayloadKind::VideoNote, note.file.id.to_string())
    } else if let Some(sticker) = msg.sticker() {
        (PayloadKind::Sticker, sticker.file.id.to_string())
    } else {
        return None;
    };

    Some(Payload::media(kind, file_id, caption))
}

/// Sends a payload to `to` with the Bot API method matching its kind.
pub async fn deliver(bot: &Bot, to: ChatId, payload: &Payload) -> ResponseResult<Message> {
    let file = || InputFile::file_id(FileId(payload.content.clone()));
    let caption = payload.caption.clone();

    match payload.kind {
        PayloadKind::Text => bot.send_message(to, payload.content.clone()).await,
        PayloadKind::Photo => {
            let request = bot.send_photo(to, file());
            match caption {
                Some(caption) => request.caption(caption).await,
                None => request.await,
            }
        }
        PayloadKind::Video => {
            let request = bot.send_video(to, file());
            match caption {
                Some(caption) => request.caption(caption).await,
                None => request.await,
            }
        }
        PayloadKind::Document => {
            let request = bot.send_document(to, file());
            match caption {
                Some(caption) => request.caption(caption).await,
                None => request.await,
            }
        }
        PayloadKind::Audio => {
            let request = bot.send_audio(to, file());
            match caption {
                Some(caption) => request.caption(caption).await,
                None => request.await,
            }
        }
        PayloadKind::Voice => {
            let request = bot.send_voice(to, file());
            match caption {
                Some(caption) => request.caption(caption).await,
                None => request.await,
            }
        }
        PayloadKind::VideoNote => bot.send_video_note(to, file()).await,
        PayloadKind::Sticker => bot.send_sticker(to, file()).await,
    }
}

/// Reply to a message kind the relay cannot carry. Outside a chat the user
/// is told so, whatever the kind.
fn unsupported_reply(user_id: i64, partner: Result<Option<i64>, ChatError>) -> &'static str {
    match partner {
        Ok(Some(_)) => UNSUPPORTED_MESSAGE,
        Ok(None) => NOT_MATCHED_MESSAGE,
        Err(e) => {
            e.log("relay", user_id);
            e.user_message()
        }
    }
}

/// Any other message: forward it to the chat partner
pub(super) async fn handle_relay(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let chat_id = msg.chat.id;

    let Some(payload) = payload_from_message(msg) else {
        let reply = unsupported_reply(user_id, deps.chat.partner_of(user_id));
        bot.send_message(chat_id, reply).await?;
        return Ok(());
    };
    let kind = payload.kind;

    match deps.chat.relay(user_id, payload) {
        Ok(RelayOutcome::Delivered { recipient_id, payload }) => {
            if let Err(e) = deliver(bot, ChatId(recipient_id), &payload).await {
                log::warn!("Relay {} from {} to {} failed: {}", kind, user_id, recipient_id, e);
                bot.send_message(chat_id, "Your message could not be delivered to your partner.")
                    .await?;
            }
        }
        Ok(RelayOutcome::NoPartner) => {
            bot.send_message(chat_id, NOT_MATCHED_MESSAGE).await?;
        }
        Ok(RelayOutcome::SelfTarget(e)) => {
            bot.send_message(chat_id, e.user_message()).await?;
        }
        Err(e) => {
            e.log("relay", user_id);
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_kind_reply_depends_on_partner() {
        assert_eq!(unsupported_reply(1, Ok(None)), NOT_MATCHED_MESSAGE);
        assert_eq!(unsupported_reply(1, Ok(Some(2))), UNSUPPORTED_MESSAGE);
        assert_eq!(
            unsupported_reply(1, Err(ChatError::StorageConflict)),
            ChatError::StorageConflict.user_message()
        );
    }
}
