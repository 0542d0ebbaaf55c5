// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only routing log. There is deliberately no update or delete.

use concierge_core::{ConciergeError, RoutingLogEntry};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{ROUTING_LOG_COLUMNS, format_timestamp, routing_log_from_row};

pub async fn append_entry(db: &Database, entry: &RoutingLogEntry) -> Result<(), ConciergeError> {
    let e = entry.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO routing_log (id, conversation_id, from_handler, to_handler, reason,
                     staff_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    e.id,
                    e.conversation_id,
                    e.from_handler.to_string(),
                    e.to_handler.to_string(),
                    e.reason.to_string(),
                    e.staff_id,
                    format_timestamp(&e.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Entries for a conversation, oldest first.
pub async fn entries_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<RoutingLogEntry>, ConciergeError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<RoutingLogEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROUTING_LOG_COLUMNS} FROM routing_log
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id], routing_log_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
