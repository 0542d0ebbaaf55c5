// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal formatting shared by the guest and staff clients.

use colored::Colorize;
use concierge_core::{
    Conversation, ConversationStatus, Handler, Message, MessageType, RoutingLogEntry, SenderType,
};

/// One chat line: `[14:02] Name: text`. System notices are dimmed and
/// bracketed instead of attributed.
pub fn message_line(message: &Message, use_color: bool) -> String {
    let time = message.created_at.format("%H:%M");
    match message.message_type {
        MessageType::System => {
            let body = format!("[{time}] -- {} --", message.content);
            if use_color {
                body.dimmed().to_string()
            } else {
                body
            }
        }
        MessageType::Text => {
            let name = if use_color {
                match message.sender_type {
                    SenderType::Guest => message.sender_name.bold().cyan().to_string(),
                    SenderType::Staff => message.sender_name.bold().green().to_string(),
                    SenderType::Ai => message.sender_name.bold().magenta().to_string(),
                }
            } else {
                message.sender_name.clone()
            };
            format!("[{time}] {name}: {}", message.content)
        }
    }
}

/// Who the guest is talking to right now.
pub fn handler_banner(handler: Handler) -> &'static str {
    match handler {
        Handler::Ai => "You are chatting with the automated assistant. Type /human to reach staff.",
        Handler::Human => "You are chatting with a member of staff.",
    }
}

/// Header used by `staff list`.
pub fn conversation_header() -> String {
    format!(
        "{:<36}  {:<10}  {:<9}  {:<7}  {:<12}  {:<20}  {}",
        "ID", "TYPE", "STATUS", "HANDLER", "STAFF", "GUEST", "UPDATED"
    )
}

/// One row of `staff list`.
pub fn conversation_row(conversation: &Conversation, use_color: bool) -> String {
    let status = format!("{:<9}", conversation.status.to_string());
    let status = if use_color && conversation.status == ConversationStatus::Escalated {
        status.yellow().bold().to_string()
    } else {
        status
    };
    let guest = match &conversation.room_number {
        Some(room) => format!("{} ({room})", conversation.guest_name),
        None => conversation.guest_name.clone(),
    };
    format!(
        "{:<36}  {:<10}  {status}  {:<7}  {:<12}  {:<20}  {}",
        conversation.id,
        conversation.conversation_type.to_string(),
        conversation.current_handler.to_string(),
        conversation.assigned_staff_id.as_deref().unwrap_or("-"),
        guest,
        conversation.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

/// Summary printed above a conversation's history.
pub fn conversation_summary(conversation: &Conversation) -> String {
    let mut summary = format!(
        "{} | {} | {} | handler {}",
        conversation.guest_name,
        conversation.conversation_type,
        conversation.status,
        conversation.current_handler
    );
    if let Some(staff) = &conversation.assigned_staff_id {
        summary.push_str(&format!(" ({staff})"));
    }
    if let Some(room) = &conversation.room_number {
        summary.push_str(&format!(" | room {room}"));
    }
    summary
}

/// One routing log line: `2026-01-01 10:00:00  ai -> human  Guest Request`.
pub fn log_line(entry: &RoutingLogEntry) -> String {
    let mut line = format!(
        "{}  {} -> {}  {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.from_handler,
        entry.to_handler,
        entry.reason
    );
    if let Some(staff) = &entry.staff_id {
        line.push_str(&format!("  by {staff}"));
    }
    line
}
