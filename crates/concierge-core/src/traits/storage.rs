// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable store trait plus its row-level change feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Conversation, ConversationStatus, ConversationType, HandlerTransition, Message, Notification,
    RoutingLogEntry,
};

/// A committed row-level change published by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ConversationInserted(Conversation),
    ConversationUpdated(Conversation),
    MessageInserted(Message),
    NotificationInserted(Notification),
}

/// Selects which change events a [`Subscription`] yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Message inserts for one conversation.
    Messages { conversation_id: String },
    /// Inserts and updates of one conversation row.
    Conversation { id: String },
    /// Notification inserts for one user.
    Notifications { user_id: String },
}

impl ChangeFilter {
    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match (self, event) {
            (ChangeFilter::Messages { conversation_id }, ChangeEvent::MessageInserted(m)) => {
                m.conversation_id == *conversation_id
            }
            (
                ChangeFilter::Conversation { id },
                ChangeEvent::ConversationInserted(c) | ChangeEvent::ConversationUpdated(c),
            ) => c.id == *id,
            (ChangeFilter::Notifications { user_id }, ChangeEvent::NotificationInserted(n)) => {
                n.user_id == *user_id
            }
            _ => false,
        }
    }
}

/// A filtered handle on the store's push feed.
///
/// Delivery is at most once and best effort: events published while the
/// receiver lags are dropped. Dropping the subscription unsubscribes.
pub struct Subscription {
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    filter: ChangeFilter,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>, filter: ChangeFilter) -> Self {
        Self {
            rx: Some(rx),
            filter,
        }
    }

    /// A subscription for a store without a push feed; `recv` yields nothing.
    pub fn detached(filter: ChangeFilter) -> Self {
        Self { rx: None, filter }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Waits for the next matching event.
    ///
    /// Returns `None` once the feed is gone, after which the caller must rely
    /// on polling alone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, filter = ?self.filter, "push feed lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// The durable store the engine coordinates through.
///
/// Guest and staff clients share no memory; every handoff decision is made
/// against rows read from and conditionally written to this store.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Prepares the backend (migrations, connections).
    async fn initialize(&self) -> Result<(), ConciergeError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), ConciergeError>;

    // --- Conversations ---

    /// Inserts a conversation.
    ///
    /// Fails with [`ConciergeError::AlreadyExists`] when the guest already has
    /// an active conversation of the same type that no staff member has claimed.
    async fn insert_conversation(&self, conversation: &Conversation)
    -> Result<(), ConciergeError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ConciergeError>;

    /// The guest's conversation of `conversation_type` with status `active`, if
    /// any. The most recently updated one wins when there are several.
    async fn find_active_conversation(
        &self,
        guest_id: &str,
        conversation_type: ConversationType,
    ) -> Result<Option<Conversation>, ConciergeError>;

    /// Conversations, optionally filtered by status, most recently updated first.
    async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ConciergeError>;

    /// Applies `transition` if the row still matches its expected state.
    ///
    /// Returns the updated conversation, or `None` when the precondition did
    /// not hold and nothing was written.
    async fn apply_transition(
        &self,
        transition: &HandlerTransition,
    ) -> Result<Option<Conversation>, ConciergeError>;

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), ConciergeError>;

    /// Full history in `created_at` order, ties in insertion order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ConciergeError>;

    /// Messages created at or after `since`, in the same order as [`messages`](Self::messages).
    async fn messages_since(
        &self,
        conversation_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, ConciergeError>;

    // --- Routing log ---

    async fn append_routing_log(&self, entry: &RoutingLogEntry) -> Result<(), ConciergeError>;

    async fn routing_log(&self, conversation_id: &str)
    -> Result<Vec<RoutingLogEntry>, ConciergeError>;

    // --- Notifications ---

    async fn insert_notification(&self, notification: &Notification)
    -> Result<(), ConciergeError>;

    /// Notifications for `user_id` created at or after `since` (all when `None`).
    async fn notifications_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, ConciergeError>;

    // --- Push feed ---

    /// Subscribes to committed changes matching `filter`.
    fn subscribe(&self, filter: ChangeFilter) -> Subscription;
}
