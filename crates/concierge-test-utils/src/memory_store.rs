// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation store for deterministic engine tests.
//!
//! Mirrors the SQLite store's observable rules: one unclaimed active conversation
//! per guest and type, conditional transitions that bump `version`, message
//! inserts that require the conversation, `created_at` ordering with ties in
//! insertion order, and a broadcast of every committed write. Every operation
//! yields once before touching state so concurrent callers interleave the way
//! they would against a real backend.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::types::timestamp_now;
use concierge_core::{
    AdapterType, ChangeEvent, ChangeFilter, ConciergeError, Conversation, ConversationStatus,
    ConversationStore, ConversationType, HandlerTransition, HealthStatus, Message, Notification,
    PluginAdapter, RoutingLogEntry, Subscription,
};
use tokio::sync::broadcast;

#[derive(Default)]
struct Tables {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    routing_log: Vec<RoutingLogEntry>,
    notifications: Vec<Notification>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
        }
    }

    /// Overwrites a conversation's status without a transition, version bump or event.
    pub fn force_status(&self, conversation_id: &str, status: ConversationStatus) {
        let mut tables = self.lock();
        if let Some(conv) = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conv.status = status;
        }
    }

    /// Number of live push subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panicking test thread must not poison the store for the others.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: ChangeEvent) {
        let _ = self.changes.send(event);
    }
}

fn sorted_by_created<T: Clone>(items: &[T], created: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_by_key(|item| created(item));
    out
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn initialize(&self) -> Result<(), ConciergeError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ConciergeError> {
        Ok(())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), ConciergeError> {
        tokio::task::yield_now().await;
        {
            let mut tables = self.lock();
            if tables.conversations.iter().any(|c| c.id == conversation.id) {
                return Err(ConciergeError::AlreadyExists {
                    entity: "conversation",
                    key: conversation.id.clone(),
                });
            }
            // Mirrors the partial unique index: only unclaimed active rows count.
            let unclaimed = |c: &Conversation| {
                c.status == ConversationStatus::Active && c.assigned_staff_id.is_none()
            };
            let duplicate_active = unclaimed(conversation)
                && tables.conversations.iter().any(|c| {
                    unclaimed(c)
                        && c.guest_id == conversation.guest_id
                        && c.conversation_type == conversation.conversation_type
                });
            if duplicate_active {
                return Err(ConciergeError::AlreadyExists {
                    entity: "active conversation",
                    key: format!("{}/{}", conversation.guest_id, conversation.conversation_type),
                });
            }
            tables.conversations.push(conversation.clone());
        }
        self.publish(ChangeEvent::ConversationInserted(conversation.clone()));
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ConciergeError> {
        tokio::task::yield_now().await;
        Ok(self.lock().conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn find_active_conversation(
        &self,
        guest_id: &str,
        conversation_type: ConversationType,
    ) -> Result<Option<Conversation>, ConciergeError> {
        tokio::task::yield_now().await;
        // Newest update wins; among equal timestamps, the later row.
        Ok(self
            .lock()
            .conversations
            .iter()
            .filter(|c| {
                c.guest_id == guest_id
                    && c.conversation_type == conversation_type
                    && c.status == ConversationStatus::Active
            })
            .max_by_key(|c| c.updated_at)
            .cloned())
    }

    async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ConciergeError> {
        tokio::task::yield_now().await;
        let tables = self.lock();
        let mut rows: Vec<(usize, Conversation)> = tables
            .conversations
            .iter()
            .enumerate()
            .filter(|(_, c)| status.is_none_or(|s| c.status == s))
            .map(|(i, c)| (i, c.clone()))
            .collect();
        rows.sort_by(|(ia, a), (ib, b)| b.updated_at.cmp(&a.updated_at).then(ib.cmp(ia)));
        Ok(rows.into_iter().map(|(_, c)| c).collect())
    }

    async fn apply_transition(
        &self,
        transition: &HandlerTransition,
    ) -> Result<Option<Conversation>, ConciergeError> {
        tokio::task::yield_now().await;
        let updated = {
            let mut tables = self.lock();
            let Some(index) = tables.conversations.iter().position(|c| {
                c.id == transition.conversation_id && c.handler_state() == transition.expected
            }) else {
                return Ok(None);
            };

            let conv = &mut tables.conversations[index];
            conv.current_handler = transition.current_handler;
            conv.status = transition.status;
            if let Some(staff_id) = &transition.assigned_staff_id {
                conv.assigned_staff_id = Some(staff_id.clone());
            }
            conv.version += 1;
            conv.updated_at = timestamp_now();
            conv.clone()
        };
        self.publish(ChangeEvent::ConversationUpdated(updated.clone()));
        Ok(Some(updated))
    }

    async fn insert_message(&self, message: &Message) -> Result<(), ConciergeError> {
        tokio::task::yield_now().await;
        {
            let mut tables = self.lock();
            if !tables
                .conversations
                .iter()
                .any(|c| c.id == message.conversation_id)
            {
                return Err(ConciergeError::NotFound {
                    entity: "conversation",
                    id: message.conversation_id.clone(),
                });
            }
            if tables.messages.iter().any(|m| m.id == message.id) {
                return Err(ConciergeError::AlreadyExists {
                    entity: "message",
                    key: message.id.clone(),
                });
            }
            tables.messages.push(message.clone());
        }
        self.publish(ChangeEvent::MessageInserted(message.clone()));
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ConciergeError> {
        tokio::task::yield_now().await;
        let tables = self.lock();
        let own: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(&own, |m| m.created_at))
    }

    async fn messages_since(
        &self,
        conversation_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, ConciergeError> {
        let all = self.messages(conversation_id).await?;
        Ok(all.into_iter().filter(|m| m.created_at >= since).collect())
    }

    async fn append_routing_log(&self, entry: &RoutingLogEntry) -> Result<(), ConciergeError> {
        tokio::task::yield_now().await;
        self.lock().routing_log.push(entry.clone());
        Ok(())
    }

    async fn routing_log(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<RoutingLogEntry>, ConciergeError> {
        tokio::task::yield_now().await;
        let tables = self.lock();
        let own: Vec<RoutingLogEntry> = tables
            .routing_log
            .iter()
            .filter(|e| e.conversation_id == conversation_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(&own, |e| e.created_at))
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), ConciergeError> {
        tokio::task::yield_now().await;
        self.lock().notifications.push(notification.clone());
        self.publish(ChangeEvent::NotificationInserted(notification.clone()));
        Ok(())
    }

    async fn notifications_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, ConciergeError> {
        tokio::task::yield_now().await;
        let tables = self.lock();
        let own: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && since.is_none_or(|s| n.created_at >= s))
            .cloned()
            .collect();
        Ok(sorted_by_created(&own, |n| n.created_at))
    }

    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription::new(self.changes.subscribe(), filter)
    }
}
