// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `concierge staff` dashboard actions.

use std::collections::HashSet;
use std::io::IsTerminal;

use colored::Colorize;
use concierge_core::{ConciergeError, StaffIdentity};
use concierge_engine::shutdown::install_signal_handler;
use concierge_engine::{ConciergeEngine, ConversationView};

use crate::StaffCommand;
use crate::render;

pub async fn run_staff(
    engine: &ConciergeEngine,
    staff: StaffIdentity,
    action: StaffCommand,
) -> Result<(), ConciergeError> {
    let use_color = std::io::stdout().is_terminal();
    match action {
        StaffCommand::List { status } => {
            let conversations = engine.sessions().list_conversations(status).await?;
            if conversations.is_empty() {
                println!("No conversations.");
                return Ok(());
            }
            println!("{}", render::conversation_header());
            for conversation in &conversations {
                println!("{}", render::conversation_row(conversation, use_color));
            }
            Ok(())
        }
        StaffCommand::Show { id, follow } => {
            if follow {
                follow_conversation(engine, staff, &id, use_color).await
            } else {
                let loaded = engine.sessions().load_by_id(&id).await?;
                println!("{}", render::conversation_summary(&loaded.conversation));
                for message in &loaded.messages {
                    println!("{}", render::message_line(message, use_color));
                }
                Ok(())
            }
        }
        StaffCommand::Takeover { id } => {
            let updated = engine.handoff().takeover(&id, &staff).await?;
            let line = format!("Took over {} for {}.", updated.id, updated.guest_name);
            if use_color {
                println!("{}", line.green());
            } else {
                println!("{line}");
            }
            Ok(())
        }
        StaffCommand::Reply { id, text } => {
            let mut view = ConversationView::open_staff(engine.staff_context(staff), &id).await?;
            let sent = view.send_message(&text).await;
            view.close().await;
            let message = sent?;
            println!("{}", render::message_line(&message, use_color));
            Ok(())
        }
        StaffCommand::Log { id } => {
            // Surface NotFound rather than an empty log.
            engine.sessions().load_by_id(&id).await?;
            let entries = engine.sessions().routing_history(&id).await?;
            if entries.is_empty() {
                println!("No handler changes.");
            }
            for entry in &entries {
                println!("{}", render::log_line(entry));
            }
            Ok(())
        }
    }
}

/// Prints the history, then every new message until interrupted.
async fn follow_conversation(
    engine: &ConciergeEngine,
    staff: StaffIdentity,
    conversation_id: &str,
    use_color: bool,
) -> Result<(), ConciergeError> {
    let mut view = ConversationView::open_staff(engine.staff_context(staff), conversation_id).await?;
    let mut state = view.state();
    let shutdown = install_signal_handler();

    let mut seen = HashSet::new();
    let mut last_summary = String::new();
    loop {
        {
            let current = state.borrow_and_update();
            if let Some(conversation) = &current.conversation {
                let summary = render::conversation_summary(conversation);
                if summary != last_summary {
                    println!("{summary}");
                    last_summary = summary;
                }
            }
            for message in &current.messages {
                if seen.insert(message.id.clone()) {
                    println!("{}", render::message_line(message, use_color));
                }
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    view.close().await;
    Ok(())
}
