//! Session Store: the `chats` table, single source of truth for chat state.
//!
//! A waiting user owns one `waiting` row with no partner. A matched pair is
//! two reciprocal `matched` rows. Every mutation here validates its state
//! transition before touching the table; the schema enforces the rest
//! (one row per user, partner set iff matched, no self-pairs).

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::chat::ChatError;
use crate::chat::Preferences;
use crate::storage::db::now_timestamp;
use crate::storage::users::{User, USER_COLUMNS};

/// State of a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Waiting,
    Matched,
}

impl SessionState {
    /// Transition table for a single row; `None` means "no row".
    ///
    /// ```text
    /// ∅       -> waiting   enqueue
    /// ∅       -> matched   seeker row of a new pair
    /// waiting -> matched   promote the waiter
    /// waiting -> ∅         cancel
    /// matched -> ∅         end chat
    /// ```
    pub fn can_transition(from: Option<Self>, to: Option<Self>) -> bool {
        matches!(
            (from, to),
            (None, Some(Self::Waiting))
                | (None, Some(Self::Matched))
                | (Some(Self::Waiting), Some(Self::Matched))
                | (Some(Self::Waiting), None)
                | (Some(Self::Matched), None)
        )
    }
}

fn state_name(state: Option<SessionState>) -> String {
    state.map_or_else(|| "none".to_string(), |s| s.to_string())
}

/// Rejects any transition outside [`SessionState::can_transition`].
pub fn ensure_transition(from: Option<SessionState>, to: Option<SessionState>) -> Result<(), ChatError> {
    if SessionState::can_transition(from, to) {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition {
            from: state_name(from),
            to: state_name(to),
        })
    }
}

/// One row of the `chats` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub partner_id: Option<i64>,
    pub state: SessionState,
    pub preferences: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get("status")?;
        let state = status.parse::<SessionState>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            partner_id: row.get("partner_id")?,
            state,
            preferences: row.get("preferences")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// The other participant of a matched row as seen from `user_id`.
    ///
    /// Returns `None` if `user_id` is on neither side or the row has no partner.
    pub fn counterpart_of(&self, user_id: i64) -> Option<i64> {
        let partner_id = self.partner_id?;
        if self.user_id == user_id {
            Some(partner_id)
        } else if partner_id == user_id {
            Some(self.user_id)
        } else {
            None
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, partner_id, status, preferences, created_at, updated_at";

/// A waiting row paired with its owner's profile.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub session_id: i64,
    pub user: User,
}

/// The row owned by `user_id`, whatever its state.
pub fn session_of(conn: &Connection, user_id: i64) -> Result<Option<Session>, ChatError> {
    let sql = format!("SELECT {} FROM chats WHERE user_id = ?1", SESSION_COLUMNS);
    Ok(conn.query_row(&sql, [user_id], Session::from_row).optional()?)
}

/// The user's own row in the given state, if any.
pub fn find_own(conn: &Connection, user_id: i64, state: SessionState) -> Result<Option<Session>, ChatError> {
    let sql = format!("SELECT {} FROM chats WHERE user_id = ?1 AND status = ?2", SESSION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![user_id, state.as_ref()], Session::from_row)
        .optional()?)
}

/// The first matched row involving `user_id` on either side.
pub fn find_matched_involving(conn: &Connection, user_id: i64) -> Result<Option<Session>, ChatError> {
    let sql = format!(
        "SELECT {} FROM chats WHERE (user_id = ?1 OR partner_id = ?1) AND status = 'matched' ORDER BY id LIMIT 1",
        SESSION_COLUMNS
    );
    Ok(conn.query_row(&sql, [user_id], Session::from_row).optional()?)
}

/// Whether any row already links `a` and `b`, in either direction.
pub fn session_between(conn: &Connection, a: i64, b: i64) -> Result<bool, ChatError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chats
         WHERE (user_id = ?1 AND partner_id = ?2) OR (user_id = ?2 AND partner_id = ?1)",
        params![a, b],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// First waiting row, in natural scan order (`id`), whose owner passes the filters.
///
/// Gender and city pass when equal or unset on the candidate; an age range
/// requires a known age inside it.
pub fn first_waiting_candidate(
    conn: &Connection,
    seeker_id: i64,
    preferences: &Preferences,
) -> Result<Option<Candidate>, ChatError> {
    let user_columns = USER_COLUMNS
        .split(", ")
        .map(|col| format!("u.{col} AS {col}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT c.id AS session_id, {user_columns}
         FROM chats c
         JOIN users u ON u.id = c.user_id
         WHERE c.status = 'waiting'
           AND c.user_id != ?1
           AND (?2 IS NULL OR u.gender IS NULL OR u.gender = ?2)
           AND (?3 IS NULL OR (u.age IS NOT NULL AND u.age BETWEEN ?3 AND ?4))
           AND (?5 IS NULL OR u.city IS NULL OR u.city = ?5)
         ORDER BY c.id
         LIMIT 1"
    );

    let (min_age, max_age) = match preferences.age {
        Some(range) => (Some(range.min), Some(range.max)),
        None => (None, None),
    };

    let candidate = conn
        .query_row(
            &sql,
            params![
                seeker_id,
                preferences.gender.as_deref(),
                min_age,
                max_age,
                preferences.city.as_deref()
            ],
            |row| {
                Ok(Candidate {
                    session_id: row.get("session_id")?,
                    user: User::from_row(row)?,
                })
            },
        )
        .optional()?;
    Ok(candidate)
}

/// Inserts a waiting row for `user_id` (∅ → waiting).
pub fn insert_waiting(conn: &Connection, user_id: i64, preferences: &str) -> Result<i64, ChatError> {
    ensure_transition(None, Some(SessionState::Waiting))?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO chats (user_id, partner_id, status, preferences, created_at, updated_at)
         VALUES (?1, NULL, 'waiting', ?2, ?3, ?3)",
        params![user_id, preferences, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts the seeker's half of a new pair (∅ → matched).
pub fn insert_matched(conn: &Connection, user_id: i64, partner_id: i64, preferences: &str) -> Result<i64, ChatError> {
    ensure_transition(None, Some(SessionState::Matched))?;
    if user_id == partner_id {
        return Err(ChatError::ConsistencyViolation(format!(
            "refusing to pair user {} with itself",
            user_id
        )));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO chats (user_id, partner_id, status, preferences, created_at, updated_at)
         VALUES (?1, ?2, 'matched', ?3, ?4, ?4)",
        params![user_id, partner_id, preferences, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Promotes a waiting row in place (waiting → matched).
///
/// Only a row that is still `waiting` is touched; if another writer got
/// there first nothing changes and [`ChatError::StorageConflict`] is returned.
pub fn promote_waiting(conn: &Connection, session_id: i64, partner_id: i64) -> Result<(), ChatError> {
    ensure_transition(Some(SessionState::Waiting), Some(SessionState::Matched))?;
    let updated = conn.execute(
        "UPDATE chats SET partner_id = ?1, status = 'matched', updated_at = ?2
         WHERE id = ?3 AND status = 'waiting' AND partner_id IS NULL",
        params![partner_id, now_timestamp(), session_id],
    )?;
    if updated == 0 {
        log::warn!("Waiting row {} changed under us, match attempt will be retried", session_id);
        return Err(ChatError::StorageConflict);
    }
    Ok(())
}

/// Deletes the user's waiting row (waiting → ∅). Returns whether one existed.
pub fn delete_waiting(conn: &Connection, user_id: i64) -> Result<bool, ChatError> {
    ensure_transition(Some(SessionState::Waiting), None)?;
    let deleted = conn.execute(
        "DELETE FROM chats WHERE user_id = ?1 AND status = 'waiting'",
        [user_id],
    )?;
    Ok(deleted > 0)
}

/// Deletes both directional rows of the pair (matched → ∅ for each).
///
/// Returns the number of rows removed.
pub fn delete_pair(conn: &Connection, user_id: i64, partner_id: i64) -> Result<usize, ChatError> {
    ensure_transition(Some(SessionState::Matched), None)?;
    let deleted = conn.execute(
        "DELETE FROM chats
         WHERE status = 'matched'
           AND ((user_id = ?1 AND partner_id = ?2) OR (user_id = ?2 AND partner_id = ?1))",
        params![user_id, partner_id],
    )?;
    Ok(deleted)
}

/// Every row, in scan order. Used by diagnostics and tests.
pub fn all_sessions(conn: &Connection) -> Result<Vec<Session>, ChatError> {
    let sql = format!("SELECT {} FROM chats ORDER BY id", SESSION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Session::from_row)?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }
    Ok(sessions)
}
