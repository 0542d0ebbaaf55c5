// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concierge - guest and staff terminal clients for hotel conversations.
//!
//! This is the binary entry point. Each subcommand opens the SQLite store and
//! the HTTP assistant delegate, then drives the engine as one actor.

mod doctor;
mod guest;
mod render;
mod staff;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use concierge_config::ConciergeConfig;
use concierge_core::{
    ConciergeError, ConversationStatus, ConversationStore, ConversationType, DelegateAdapter,
    GuestIdentity, StaffIdentity,
};
use concierge_delegate::HttpDelegate;
use concierge_engine::ConciergeEngine;
use concierge_storage::SqliteStore;
use tracing_subscriber::EnvFilter;

/// Concierge - hotel guest messaging with assistant-to-staff handoff.
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat as a guest, resuming the active conversation of the chosen type.
    Guest {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// `assisted` starts with the automated assistant, `concierge` with staff.
        #[arg(long = "type", default_value = "assisted")]
        conversation_type: ConversationType,
    },
    /// Staff dashboard actions.
    Staff {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[command(subcommand)]
        action: StaffCommand,
    },
    /// Run diagnostic checks against the store and the delegate.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
        /// Also run the database integrity check.
        #[arg(long)]
        deep: bool,
    },
}

#[derive(Subcommand, Debug)]
enum StaffCommand {
    /// List conversations, most recently updated first.
    List {
        #[arg(long)]
        status: Option<ConversationStatus>,
    },
    /// Print a conversation's history.
    Show {
        id: String,
        /// Keep printing new messages until interrupted.
        #[arg(long)]
        follow: bool,
    },
    /// Take a conversation over from the assistant or the escalation queue.
    Takeover { id: String },
    /// Post a staff message. The conversation must be handled by staff.
    Reply { id: String, text: String },
    /// Print the handler routing log.
    Log { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => concierge_config::load_and_validate_path(path),
        None => concierge_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            concierge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ConciergeConfig) -> Result<(), ConciergeError> {
    match command {
        Commands::Doctor { plain, deep } => doctor::run_doctor(&config, deep, plain).await,
        Commands::Guest {
            id,
            name,
            room,
            email,
            conversation_type,
        } => {
            let engine = open_engine(config).await?;
            let guest = GuestIdentity {
                guest_id: id,
                name,
                email,
                room_number: room,
            };
            let result = guest::run_guest(&engine, guest, conversation_type).await;
            engine.shutdown().await;
            result
        }
        Commands::Staff { id, name, action } => {
            let engine = open_engine(config).await?;
            let staff = StaffIdentity { staff_id: id, name };
            let result = staff::run_staff(&engine, staff, action).await;
            engine.shutdown().await;
            result
        }
    }
}

/// Opens the SQLite store and the HTTP delegate and starts the engine.
async fn open_engine(config: ConciergeConfig) -> Result<ConciergeEngine, ConciergeError> {
    let store: Arc<dyn ConversationStore> = Arc::new(SqliteStore::new(config.storage.clone()));
    let delegate: Arc<dyn DelegateAdapter> = Arc::new(HttpDelegate::new(&config.delegate)?);
    ConciergeEngine::start(store, delegate, config).await
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("concierge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
