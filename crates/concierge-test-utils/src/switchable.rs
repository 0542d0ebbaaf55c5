// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrapper with a switchable push feed and injectable failures.
//!
//! Subscribers get their events from the wrapper, not from the inner store,
//! so turning push off simulates a dead realtime channel while writes still
//! land and polling still sees them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::{
    AdapterType, ChangeEvent, ChangeFilter, ConciergeError, Conversation, ConversationStatus,
    ConversationStore, ConversationType, HandlerTransition, HealthStatus, Message, Notification,
    PluginAdapter, RoutingLogEntry, Subscription,
};
use tokio::sync::broadcast;
use tracing::debug;

pub struct SwitchableStore {
    inner: Arc<dyn ConversationStore>,
    changes: broadcast::Sender<ChangeEvent>,
    push_enabled: AtomicBool,
    fail_reads: AtomicBool,
    fail_message_inserts: AtomicBool,
    message_reads: AtomicUsize,
}

impl SwitchableStore {
    pub fn new(inner: Arc<dyn ConversationStore>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner,
            changes,
            push_enabled: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            fail_message_inserts: AtomicBool::new(false),
            message_reads: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<dyn ConversationStore> {
        &self.inner
    }

    /// Stops or resumes publishing. Events written while off are never replayed.
    pub fn set_push(&self, enabled: bool) {
        debug!(enabled, "push feed toggled");
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Makes every read fail with a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes message inserts fail with a storage error.
    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_message_inserts.store(fail, Ordering::SeqCst);
    }

    /// Count of history and since-queries, i.e. loads plus polls.
    pub fn message_reads(&self) -> usize {
        self.message_reads.load(Ordering::SeqCst)
    }

    /// Number of live push subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, event: ChangeEvent) {
        if self.push_enabled.load(Ordering::SeqCst) {
            let _ = self.changes.send(event);
        }
    }

    fn check_read(&self) -> Result<(), ConciergeError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        Ok(())
    }
}

fn injected(what: &str) -> ConciergeError {
    ConciergeError::Storage {
        source: format!("injected {what} failure").into(),
    }
}

#[async_trait]
impl PluginAdapter for SwitchableStore {
    fn name(&self) -> &str {
        "switchable"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        if !self.push_enabled.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("push feed disabled".into()));
        }
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl ConversationStore for SwitchableStore {
    async fn initialize(&self) -> Result<(), ConciergeError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), ConciergeError> {
        self.inner.close().await
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), ConciergeError> {
        self.inner.insert_conversation(conversation).await?;
        self.publish(ChangeEvent::ConversationInserted(conversation.clone()));
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ConciergeError> {
        self.check_read()?;
        self.inner.get_conversation(id).await
    }

    async fn find_active_conversation(
        &self,
        guest_id: &str,
        conversation_type: ConversationType,
    ) -> Result<Option<Conversation>, ConciergeError> {
        self.check_read()?;
        self.inner
            .find_active_conversation(guest_id, conversation_type)
            .await
    }

    async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ConciergeError> {
        self.check_read()?;
        self.inner.list_conversations(status).await
    }

    async fn apply_transition(
        &self,
        transition: &HandlerTransition,
    ) -> Result<Option<Conversation>, ConciergeError> {
        let updated = self.inner.apply_transition(transition).await?;
        if let Some(conversation) = &updated {
            self.publish(ChangeEvent::ConversationUpdated(conversation.clone()));
        }
        Ok(updated)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), ConciergeError> {
        if self.fail_message_inserts.load(Ordering::SeqCst) {
            return Err(injected("message insert"));
        }
        self.inner.insert_message(message).await?;
        self.publish(ChangeEvent::MessageInserted(message.clone()));
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ConciergeError> {
        self.message_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        self.inner.messages(conversation_id).await
    }

    async fn messages_since(
        &self,
        conversation_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, ConciergeError> {
        self.message_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        self.inner.messages_since(conversation_id, since).await
    }

    async fn append_routing_log(&self, entry: &RoutingLogEntry) -> Result<(), ConciergeError> {
        self.inner.append_routing_log(entry).await
    }

    async fn routing_log(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<RoutingLogEntry>, ConciergeError> {
        self.check_read()?;
        self.inner.routing_log(conversation_id).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), ConciergeError> {
        self.inner.insert_notification(notification).await?;
        self.publish(ChangeEvent::NotificationInserted(notification.clone()));
        Ok(())
    }

    async fn notifications_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, ConciergeError> {
        self.check_read()?;
        self.inner.notifications_since(user_id, since).await
    }

    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription::new(self.changes.subscribe(), filter)
    }
}
