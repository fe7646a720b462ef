//! Ending chats and leaving the waiting queue.

use rusqlite::{Connection, TransactionBehavior};

use super::error::ChatError;
use crate::storage::sessions;

/// Ends the active chat of `user_id`, deleting both rows of the pair.
///
/// Returns the partner id so the caller can notify them, or `None` when
/// the user is not in a chat. Calling it again is a no-op returning `None`.
pub fn end_chat(conn: &mut Connection, user_id: i64) -> Result<Option<i64>, ChatError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(session) = sessions::find_matched_involving(&tx, user_id)? else {
        return Ok(None);
    };

    let partner_id = session.counterpart_of(user_id).ok_or_else(|| {
        ChatError::ConsistencyViolation(format!("matched row {} has no partner for user {}", session.id, user_id))
    })?;
    if partner_id == user_id {
        return Err(ChatError::ConsistencyViolation(format!(
            "matched row {} pairs user {} with itself",
            session.id, user_id
        )));
    }

    let deleted = sessions::delete_pair(&tx, user_id, partner_id)?;
    tx.commit()?;

    if deleted != 2 {
        log::warn!(
            "Ending chat {} <-> {} removed {} row(s) instead of 2",
            user_id,
            partner_id,
            deleted
        );
    }
    log::info!("User {} ended chat with {}", user_id, partner_id);
    Ok(Some(partner_id))
}

/// Removes the waiting row of `user_id`. Returns whether there was one.
pub fn cancel_waiting(conn: &mut Connection, user_id: i64) -> Result<bool, ChatError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let removed = sessions::delete_waiting(&tx, user_id)?;
    tx.commit()?;

    if removed {
        log::info!("User {} left the waiting queue", user_id);
    }
    Ok(removed)
}
