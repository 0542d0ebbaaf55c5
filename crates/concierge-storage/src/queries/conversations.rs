// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD and the conditional handler update.

use concierge_core::types::timestamp_now;
use concierge_core::{
    ConciergeError, Conversation, ConversationStatus, ConversationType, HandlerTransition,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, is_unique_violation, map_tr_err};
use crate::models::{CONVERSATION_COLUMNS, conversation_from_row, format_timestamp};

/// Insert a new conversation.
///
/// A second unclaimed active conversation for the same guest and type trips
/// the partial unique index and is reported as [`ConciergeError::AlreadyExists`].
pub async fn insert_conversation(db: &Database, conv: &Conversation) -> Result<(), ConciergeError> {
    let c = conv.clone();
    let inserted = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let result = conn.execute(
                "INSERT INTO conversations (id, guest_id, guest_name, guest_email, room_number,
                     conversation_type, status, current_handler, assigned_staff_id, version,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    c.id,
                    c.guest_id,
                    c.guest_name,
                    c.guest_email,
                    c.room_number,
                    c.conversation_type.to_string(),
                    c.status.to_string(),
                    c.current_handler.to_string(),
                    c.assigned_staff_id,
                    c.version,
                    format_timestamp(&c.created_at),
                    format_timestamp(&c.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(())
    } else {
        Err(ConciergeError::AlreadyExists {
            entity: "active conversation",
            key: format!("{}/{}", conv.guest_id, conv.conversation_type),
        })
    }
}

/// Get a conversation by ID.
pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, ConciergeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The guest's active conversation of the given type, if any.
///
/// After a takeover of an escalated conversation the guest can hold two active
/// rows; the most recently updated one wins.
pub async fn find_active_conversation(
    db: &Database,
    guest_id: &str,
    conversation_type: ConversationType,
) -> Result<Option<Conversation>, ConciergeError> {
    let guest_id = guest_id.to_string();
    let conversation_type = conversation_type.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE guest_id = ?1 AND conversation_type = ?2 AND status = 'active'
                     ORDER BY updated_at DESC, rowid DESC LIMIT 1"
                ),
                params![guest_id, conversation_type],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations, optionally filtered by status, most recently updated first.
pub async fn list_conversations(
    db: &Database,
    status: Option<ConversationStatus>,
) -> Result<Vec<Conversation>, ConciergeError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Conversation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map(params![status], conversation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Conditionally apply a handler transition.
///
/// The UPDATE only matches while `current_handler`, `status` and `version`
/// still equal the expected values, so of two racing transitions exactly one
/// lands. Returns the updated row, or `None` if the precondition failed.
pub async fn apply_transition(
    db: &Database,
    transition: &HandlerTransition,
) -> Result<Option<Conversation>, ConciergeError> {
    let t = transition.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE conversations
                 SET current_handler = ?1,
                     status = ?2,
                     assigned_staff_id = COALESCE(?3, assigned_staff_id),
                     version = version + 1,
                     updated_at = ?4
                 WHERE id = ?5 AND current_handler = ?6 AND status = ?7 AND version = ?8",
                params![
                    t.current_handler.to_string(),
                    t.status.to_string(),
                    t.assigned_staff_id,
                    format_timestamp(&timestamp_now()),
                    t.conversation_id,
                    t.expected.current_handler.to_string(),
                    t.expected.status.to_string(),
                    t.expected.version,
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![t.conversation_id],
                conversation_from_row,
            )
            .map(Some)
        })
        .await
        .map_err(map_tr_err)
}
