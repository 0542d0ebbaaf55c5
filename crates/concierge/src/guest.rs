// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `concierge guest` interactive chat.
//!
//! Input is read with rustyline on a dedicated thread; the view's state is
//! watched on a separate task that prints new messages, typing changes and
//! handler changes as they arrive from push or polling.

use std::collections::HashSet;
use std::io::IsTerminal;

use colored::Colorize;
use concierge_core::{ConciergeError, ConversationType, GuestIdentity, Handler};
use concierge_engine::shutdown::install_signal_handler;
use concierge_engine::{ConciergeEngine, ConversationState, ConversationView};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::render;

/// Runs the guest chat until `/quit`, end of input, or a shutdown signal.
pub async fn run_guest(
    engine: &ConciergeEngine,
    guest: GuestIdentity,
    conversation_type: ConversationType,
) -> Result<(), ConciergeError> {
    let use_color = std::io::stdout().is_terminal();
    let ctx = engine.guest_context(guest);
    let mut view = ConversationView::open_guest(ctx, conversation_type).await?;

    let shutdown = install_signal_handler();
    let printer_token = shutdown.child_token();
    let printer = tokio::spawn(print_updates(
        view.state(),
        printer_token.clone(),
        use_color,
    ));

    let mut lines = spawn_reader()?;
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        match parse_input(&line) {
            GuestInput::Empty => {}
            GuestInput::Quit => break,
            GuestInput::Help => print_help(),
            GuestInput::Human(reason) => {
                if let Err(e) = view.escalate_to_human(reason).await {
                    report(&e, use_color);
                }
            }
            GuestInput::Say(text) => {
                if let Err(e) = view.send_message(text).await {
                    report(&e, use_color);
                }
            }
        }
    }

    printer_token.cancel();
    let _ = printer.await;
    view.close().await;
    shutdown.cancel();
    println!("Goodbye.");
    Ok(())
}

/// A parsed line of guest input.
#[derive(Debug, PartialEq, Eq)]
enum GuestInput<'a> {
    Empty,
    Quit,
    Help,
    /// `/human [reason]`.
    Human(Option<String>),
    Say(&'a str),
}

fn parse_input(line: &str) -> GuestInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return GuestInput::Empty;
    }
    match trimmed.split_once(char::is_whitespace) {
        _ if trimmed == "/quit" || trimmed == "/exit" => GuestInput::Quit,
        _ if trimmed == "/help" => GuestInput::Help,
        _ if trimmed == "/human" => GuestInput::Human(None),
        Some(("/human", reason)) => GuestInput::Human(Some(reason.trim().to_string())),
        _ => GuestInput::Say(trimmed),
    }
}

fn print_help() {
    println!("  /human [reason]  ask for a member of staff");
    println!("  /quit            leave the chat");
}

fn report(error: &ConciergeError, use_color: bool) {
    if use_color {
        eprintln!("{}: {error}", "error".red());
    } else {
        eprintln!("error: {error}");
    }
}

/// Reads lines on a plain thread so a pending `readline` never holds up
/// runtime shutdown.
fn spawn_reader() -> Result<mpsc::Receiver<String>, ConciergeError> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| ConciergeError::Internal(format!("failed to initialize line editor: {e}")))?;
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    debug!(error = %e, "readline failed");
                    break;
                }
            }
        }
    });
    Ok(rx)
}

async fn print_updates(
    mut state: watch::Receiver<ConversationState>,
    cancel: CancellationToken,
    use_color: bool,
) {
    let mut printer = StatePrinter::default();
    loop {
        for line in printer.lines(&state.borrow_and_update(), use_color) {
            println!("{line}");
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = state.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Turns successive view states into the lines not yet printed.
#[derive(Default)]
struct StatePrinter {
    seen: HashSet<String>,
    handler: Option<Handler>,
    typing: bool,
}

impl StatePrinter {
    fn lines(&mut self, state: &ConversationState, use_color: bool) -> Vec<String> {
        let mut out = Vec::new();
        for message in &state.messages {
            if self.seen.insert(message.id.clone()) {
                out.push(render::message_line(message, use_color));
            }
        }
        if state.current_handler.is_some() && state.current_handler != self.handler {
            self.handler = state.current_handler;
            if let Some(handler) = self.handler {
                out.push(banner(render::handler_banner(handler), use_color));
            }
        }
        if state.is_typing && !self.typing {
            out.push(banner("The assistant is typing...", use_color));
        }
        self.typing = state.is_typing;
        out
    }
}

fn banner(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().italic().to_string()
    } else {
        format!("({text})")
    }
}
