// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite TEXT columns and the core domain types.
//!
//! Enums are stored in their snake_case form and timestamps with
//! [`TIMESTAMP_FORMAT`], so rows stay readable from the `sqlite3` shell.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use concierge_core::types::{
    Conversation, HandoffReason, Message, Notification, RoutingLogEntry, TIMESTAMP_FORMAT,
    format_timestamp,
};

/// Column list shared by every conversation SELECT, in [`conversation_from_row`] order.
pub const CONVERSATION_COLUMNS: &str = "id, guest_id, guest_name, guest_email, room_number, \
     conversation_type, status, current_handler, assigned_staff_id, version, created_at, updated_at";

pub const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_type, sender_id, sender_name, content, message_type, created_at";

pub const ROUTING_LOG_COLUMNS: &str =
    "id, conversation_id, from_handler, to_handler, reason, staff_id, created_at";

pub const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, body, reference_id, created_at";

fn parse_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        guest_id: row.get(1)?,
        guest_name: row.get(2)?,
        guest_email: row.get(3)?,
        room_number: row.get(4)?,
        conversation_type: parse_enum(row, 5)?,
        status: parse_enum(row, 6)?,
        current_handler: parse_enum(row, 7)?,
        assigned_staff_id: row.get(8)?,
        version: row.get(9)?,
        created_at: parse_timestamp(row, 10)?,
        updated_at: parse_timestamp(row, 11)?,
    })
}

pub fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_type: parse_enum(row, 2)?,
        sender_id: row.get(3)?,
        sender_name: row.get(4)?,
        content: row.get(5)?,
        message_type: parse_enum(row, 6)?,
        created_at: parse_timestamp(row, 7)?,
    })
}

pub fn routing_log_from_row(row: &Row<'_>) -> rusqlite::Result<RoutingLogEntry> {
    let reason: String = row.get(4)?;
    Ok(RoutingLogEntry {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        from_handler: parse_enum(row, 2)?,
        to_handler: parse_enum(row, 3)?,
        reason: HandoffReason::from(reason),
        staff_id: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}

pub fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: parse_enum(row, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        reference_id: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}
