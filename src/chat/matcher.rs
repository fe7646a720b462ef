//! Matcher: pairs a seeker with the first compatible waiting user.

use rusqlite::{Connection, TransactionBehavior};

use super::error::ChatError;
use super::preferences::Preferences;
use crate::storage::sessions::{self, SessionState};
use crate::storage::users::{self, User};

/// Result of a single search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The seeker is already in a chat (or already linked to the candidate)
    AlreadyMatched,
    /// The seeker is already queued
    AlreadyWaiting,
    /// Paired with this waiting user
    Matched(User),
    /// No candidate; the seeker now waits
    Enqueued,
}

/// Runs one match attempt inside a `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken before the candidate scan, so two seekers can
/// never promote the same waiting row. Returns [`ChatError::StorageConflict`]
/// when a concurrent writer still got in the way; the caller may re-run it.
/// A seeker without a profile is [`ChatError::UserNotFound`].
pub fn try_match(conn: &mut Connection, seeker_id: i64, preferences: &Preferences) -> Result<MatchOutcome, ChatError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if users::get_user(&tx, seeker_id)?.is_none() {
        return Err(ChatError::UserNotFound(seeker_id));
    }
    if sessions::find_own(&tx, seeker_id, SessionState::Matched)?.is_some() {
        return Ok(MatchOutcome::AlreadyMatched);
    }
    if sessions::find_own(&tx, seeker_id, SessionState::Waiting)?.is_some() {
        return Ok(MatchOutcome::AlreadyWaiting);
    }
    // Counterpart of someone else's matched row without a row of its own
    if sessions::find_matched_involving(&tx, seeker_id)?.is_some() {
        return Ok(MatchOutcome::AlreadyMatched);
    }

    let wire = preferences.to_string();

    let Some(candidate) = sessions::first_waiting_candidate(&tx, seeker_id, preferences)? else {
        sessions::insert_waiting(&tx, seeker_id, &wire)?;
        tx.commit()?;
        log::info!("User {} enqueued with preferences {}", seeker_id, wire);
        return Ok(MatchOutcome::Enqueued);
    };

    let partner = candidate.user;
    if partner.id == seeker_id {
        return Err(ChatError::ConsistencyViolation(format!(
            "candidate scan returned the seeker {} itself",
            seeker_id
        )));
    }

    if sessions::session_between(&tx, seeker_id, partner.id)? {
        log::warn!(
            "Session between {} and {} already exists, not pairing again",
            seeker_id,
            partner.id
        );
        return Ok(MatchOutcome::AlreadyMatched);
    }

    sessions::promote_waiting(&tx, candidate.session_id, seeker_id)?;
    sessions::insert_matched(&tx, seeker_id, partner.id, &wire)?;
    tx.commit()?;

    log::info!("Matched user {} with waiting user {}", seeker_id, partner.id);
    Ok(MatchOutcome::Matched(partner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use crate::storage::users::{create_user, update_user, UserUpdate};

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn add_user(conn: &Connection, id: i64, gender: &str, age: u32, city: &str) {
        create_user(conn, id, &format!("user{id}"), None).unwrap();
        update_user(
            conn,
            id,
            &UserUpdate {
                gender: Some(gender.to_string()),
                age: Some(age),
                city: Some(city.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    }

    fn prefs(raw: &str) -> Preferences {
        raw.parse().unwrap()
    }

    #[test]
    fn test_miss_enqueues_then_reports_waiting() {
        let mut conn = setup();
        add_user(&conn, 1, "m", 30, "Tokyo");

        assert_eq!(try_match(&mut conn, 1, &prefs("any/any/any")).unwrap(), MatchOutcome::Enqueued);
        assert_eq!(
            try_match(&mut conn, 1, &prefs("any/any/any")).unwrap(),
            MatchOutcome::AlreadyWaiting
        );
        assert_eq!(sessions::all_sessions(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_hit_pairs_both_rows() {
        let mut conn = setup();
        add_user(&conn, 1, "f", 28, "Berlin");
        add_user(&conn, 2, "m", 31, "Berlin");

        try_match(&mut conn, 1, &prefs("any/any/any")).unwrap();
        let outcome = try_match(&mut conn, 2, &prefs("f/25-30/any")).unwrap();
        match outcome {
            MatchOutcome::Matched(partner) => assert_eq!(partner.id, 1),
            other => panic!("expected a match, got {other:?}"),
        }

        let rows = sessions::all_sessions(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|s| s.state == SessionState::Matched));
        assert_eq!(rows[0].user_id, 1);
        assert_eq!(rows[0].partner_id, Some(2));
        assert_eq!(rows[1].user_id, 2);
        assert_eq!(rows[1].partner_id, Some(1));
        assert_eq!(rows[1].preferences.as_deref(), Some("f/25-30/any"));

        assert_eq!(
            try_match(&mut conn, 1, &prefs("any/any/any")).unwrap(),
            MatchOutcome::AlreadyMatched
        );
    }

    #[test]
    fn test_lowest_id_wins_tie() {
        let mut conn = setup();
        add_user(&conn, 5, "f", 25, "Rome");
        add_user(&conn, 3, "f", 25, "Rome");
        add_user(&conn, 9, "m", 25, "Rome");

        // Row order, not user id order
        try_match(&mut conn, 5, &prefs("m/any/any")).unwrap();
        try_match(&mut conn, 3, &prefs("m/any/any")).unwrap();

        match try_match(&mut conn, 9, &prefs("any/any/any")).unwrap() {
            MatchOutcome::Matched(partner) => assert_eq!(partner.id, 5),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_seeker_is_not_found() {
        let mut conn = setup();
        let err = try_match(&mut conn, 42, &Preferences::any()).unwrap_err();
        assert!(matches!(err, ChatError::UserNotFound(42)));
        assert!(sessions::all_sessions(&conn).unwrap().is_empty());
    }
}
