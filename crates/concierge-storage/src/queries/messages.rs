// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message insert and history queries.

use chrono::{DateTime, Utc};
use concierge_core::{ConciergeError, Message};
use rusqlite::params;

use crate::database::{Database, is_foreign_key_violation, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, format_timestamp, message_from_row};

/// Insert a new message. Fails with `NotFound` if the conversation is unknown.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), ConciergeError> {
    let m = msg.clone();
    let inserted = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let result = conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_type, sender_id, sender_name,
                     content, message_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    m.id,
                    m.conversation_id,
                    m.sender_type.to_string(),
                    m.sender_id,
                    m.sender_name,
                    m.content,
                    m.message_type.to_string(),
                    format_timestamp(&m.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(e) if is_foreign_key_violation(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(())
    } else {
        Err(ConciergeError::NotFound {
            entity: "conversation",
            id: msg.conversation_id.clone(),
        })
    }
}

/// Full history for a conversation in chronological order.
///
/// Messages sharing a timestamp come back in insertion order.
pub async fn get_messages(db: &Database, conversation_id: &str) -> Result<Vec<Message>, ConciergeError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages created at or after `since`.
///
/// The bound is inclusive so a message sharing the cursor's timestamp is never
/// skipped; callers drop the ones they already hold by id.
pub async fn get_messages_since(
    db: &Database,
    conversation_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Message>, ConciergeError> {
    let conversation_id = conversation_id.to_string();
    let since = format_timestamp(&since);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND created_at >= ?2
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, since], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
