// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Concierge conversation engine.
//!
//! This crate provides the domain types (conversations, messages, routing log
//! entries, notifications), the error taxonomy, and the adapter traits every
//! backend implements: the durable [`ConversationStore`] and the automated
//! assistant [`DelegateAdapter`].

pub mod error;
pub mod traits;
pub mod types;

pub use error::ConciergeError;
pub use types::{
    AdapterType, Conversation, ConversationStatus, ConversationType, DelegateRequest,
    GuestIdentity, Handler, HandlerState, HandlerTransition, HandoffReason, HealthStatus, Message,
    MessageType, Notification, NotificationKind, RoutingLogEntry, SenderType, StaffIdentity,
};

pub use traits::{
    ChangeEvent, ChangeFilter, ConversationStore, DelegateAdapter, PluginAdapter, Subscription,
};
