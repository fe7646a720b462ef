//! Reply and inline keyboards, and the button texts they carry.

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, WebAppInfo,
};

use crate::core::config;

/// Actions triggered by reply-keyboard buttons. Matched on the exact text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter)]
pub enum ChatAction {
    #[strum(serialize = "Start Chat")]
    StartChat,
    #[strum(serialize = "Search Partner")]
    SearchPartner,
    #[strum(serialize = "End Chat")]
    EndChat,
    #[strum(serialize = "Cancel Waiting")]
    CancelWaiting,
    #[strum(serialize = "Menu")]
    Menu,
}

impl ChatAction {
    pub fn from_text(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

pub const CALLBACK_MY_POINTS: &str = "menu_my_points";
pub const CALLBACK_EDIT_PREFERENCES: &str = "menu_edit_preferences";

fn reply_keyboard(actions: &[ChatAction]) -> KeyboardMarkup {
    let rows = actions
        .iter()
        .map(|action| vec![KeyboardButton::new(action.as_ref())])
        .collect::<Vec<_>>();
    KeyboardMarkup::new(rows).one_time_keyboard().resize_keyboard()
}

/// Idle user: search or open the menu
pub fn main_keyboard() -> KeyboardMarkup {
    reply_keyboard(&[ChatAction::SearchPartner, ChatAction::Menu])
}

pub fn waiting_keyboard() -> KeyboardMarkup {
    reply_keyboard(&[ChatAction::CancelWaiting, ChatAction::Menu])
}

pub fn in_chat_keyboard() -> KeyboardMarkup {
    reply_keyboard(&[ChatAction::EndChat, ChatAction::Menu])
}

pub fn share_contact_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new("Share Contact").request(ButtonRequest::Contact)]])
        .one_time_keyboard()
        .resize_keyboard()
}

/// Inline button opening the registration web app for `user_id`.
///
/// Returns `None` when `WEBAPP_URL` is not a valid URL.
pub fn registration_keyboard(user_id: i64) -> Option<InlineKeyboardMarkup> {
    let raw = config::webapp::registration_url(user_id);
    match url::Url::parse(&raw) {
        Ok(url) => Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
            "Complete Registration",
            WebAppInfo { url },
        )]])),
        Err(e) => {
            log::error!("WEBAPP_URL gives an invalid registration link {}: {}", raw, e);
            None
        }
    }
}

pub fn menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("My Points", CALLBACK_MY_POINTS)],
        vec![InlineKeyboardButton::callback("Edit Preferences", CALLBACK_EDIT_PREFERENCES)],
    ])
}
