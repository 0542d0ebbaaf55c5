// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Concierge conversation engine.

use thiserror::Error;

use crate::types::{ConversationStatus, Handler};

/// The primary error type used across all Concierge adapters and engine operations.
#[derive(Debug, Error)]
pub enum ConciergeError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable store errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A record that was expected to exist is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An insert collided with a uniqueness constraint.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// The automated assistant could not be reached or returned an error.
    #[error("delegate error: {message}")]
    Delegate {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested handler transition is not allowed from the current state.
    #[error(
        "invalid transition for conversation {conversation_id}: {reason} \
         (handler={handler}, status={status})"
    )]
    InvalidTransition {
        conversation_id: String,
        handler: Handler,
        status: ConversationStatus,
        reason: String,
    },

    /// Another actor changed the conversation between read and conditional update.
    #[error("conversation {conversation_id} was modified concurrently")]
    TransitionConflict { conversation_id: String },

    /// The acting party is not the conversation's active handler.
    #[error("{actor} is not the active handler of conversation {conversation_id} (handler={handler})")]
    NotActiveHandler {
        conversation_id: String,
        actor: String,
        handler: Handler,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConciergeError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Whether re-invoking the failed operation may succeed.
    ///
    /// UIs render retryable failures with a retry affordance and everything
    /// else as a transient notice.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { .. }
            | Self::Delegate { .. }
            | Self::Timeout { .. }
            | Self::TransitionConflict { .. } => true,
            Self::Config(_)
            | Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::InvalidTransition { .. }
            | Self::NotActiveHandler { .. }
            | Self::Internal(_) => false,
        }
    }
}
