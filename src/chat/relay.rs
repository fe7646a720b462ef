//! Relay: resolves where a message from a chatting user should go.
//!
//! The content itself is opaque here; delivery is done by the transport.

use rusqlite::Connection;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use super::error::ChatError;
use crate::storage::sessions;

/// Message kinds that can be forwarded to a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl PayloadKind {
    /// Video notes and stickers cannot carry a caption.
    pub fn supports_caption(self) -> bool {
        !matches!(self, Self::Text | Self::VideoNote | Self::Sticker)
    }
}

/// A message to forward verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub kind: PayloadKind,
    /// Message text, or the Telegram file id for media
    pub content: String,
    pub caption: Option<String>,
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            content: content.into(),
            caption: None,
        }
    }

    /// Media payload; the caption is dropped for kinds that cannot carry one.
    pub fn media(kind: PayloadKind, file_id: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind,
            content: file_id.into(),
            caption: caption.filter(|_| kind.supports_caption()),
        }
    }
}

#[derive(Debug)]
pub enum RelayOutcome {
    /// Sender is not in a chat; nothing must be delivered
    NoPartner,
    /// The partner resolved to the sender. Data bug, never delivered
    SelfTarget(ChatError),
    Delivered { recipient_id: i64, payload: Payload },
}

/// Active chat partner of `user_id`, resolved from either column.
///
/// A matched row that resolves the user to itself is a
/// [`ChatError::ConsistencyViolation`].
pub fn partner_of(conn: &Connection, user_id: i64) -> Result<Option<i64>, ChatError> {
    let Some(session) = sessions::find_matched_involving(conn, user_id)? else {
        return Ok(None);
    };

    match session.counterpart_of(user_id) {
        Some(partner_id) if partner_id != user_id => Ok(Some(partner_id)),
        _ => Err(ChatError::ConsistencyViolation(format!(
            "matched row {} resolves user {} to itself",
            session.id, user_id
        ))),
    }
}

/// Resolves the sender's active partner and hands back the payload for it.
pub fn relay(conn: &Connection, sender_id: i64, payload: Payload) -> Result<RelayOutcome, ChatError> {
    match partner_of(conn, sender_id) {
        Ok(Some(recipient_id)) => Ok(RelayOutcome::Delivered { recipient_id, payload }),
        Ok(None) => Ok(RelayOutcome::NoPartner),
        Err(err @ ChatError::ConsistencyViolation(_)) => {
            err.log("relay", sender_id);
            Ok(RelayOutcome::SelfTarget(err))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::matcher::try_match;
    use crate::chat::Preferences;
    use crate::storage::migrations::run_migrations;
    use crate::storage::users::create_user;

    fn setup(ids: &[i64]) -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        for id in ids {
            create_user(&conn, *id, "user", None).unwrap();
        }
        conn
    }

    #[test]
    fn test_relay_without_partner() {
        let mut conn = setup(&[1]);
        assert!(matches!(relay(&conn, 1, Payload::text("hi")).unwrap(), RelayOutcome::NoPartner));

        // Waiting is not chatting
        try_match(&mut conn, 1, &Preferences::any()).unwrap();
        assert!(matches!(relay(&conn, 1, Payload::text("hi")).unwrap(), RelayOutcome::NoPartner));
    }

    #[test]
    fn test_relay_is_symmetric() {
        let mut conn = setup(&[1, 2]);
        try_match(&mut conn, 1, &Preferences::any()).unwrap();
        try_match(&mut conn, 2, &Preferences::any()).unwrap();

        match relay(&conn, 1, Payload::text("hello")).unwrap() {
            RelayOutcome::Delivered { recipient_id, payload } => {
                assert_eq!(recipient_id, 2);
                assert_eq!(payload, Payload::text("hello"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match relay(&conn, 2, Payload::media(PayloadKind::Photo, "file-1", Some("look".into()))).unwrap() {
            RelayOutcome::Delivered { recipient_id, payload } => {
                assert_eq!(recipient_id, 1);
                assert_eq!(payload.caption.as_deref(), Some("look"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_captions_dropped_where_unsupported() {
        let sticker = Payload::media(PayloadKind::Sticker, "s", Some("ignored".into()));
        assert_eq!(sticker.caption, None);
        let note = Payload::media(PayloadKind::VideoNote, "v", Some("ignored".into()));
        assert_eq!(note.caption, None);
        assert_eq!(PayloadKind::VideoNote.to_string(), "video_note");
    }

    #[test]
    fn test_partner_of() {
        let mut conn = setup(&[1, 2, 3]);
        assert_eq!(partner_of(&conn, 1).unwrap(), None);

        try_match(&mut conn, 1, &Preferences::any()).unwrap();
        assert_eq!(partner_of(&conn, 1).unwrap(), None);

        try_match(&mut conn, 2, &Preferences::any()).unwrap();
        assert_eq!(partner_of(&conn, 1).unwrap(), Some(2));
        assert_eq!(partner_of(&conn, 2).unwrap(), Some(1));
        assert_eq!(partner_of(&conn, 3).unwrap(), None);
    }
}
