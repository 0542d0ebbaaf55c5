// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation session manager.
//!
//! Resolves which conversation a client is looking at and loads its history:
//! - guests resume their active conversation of a type, or create one with a
//!   welcome system message;
//! - staff load any conversation by id.
//!
//! Nothing here is retried. Store failures are reported to the caller, which
//! decides whether to offer a retry.

use std::sync::Arc;

use concierge_config::model::MessagesConfig;
use concierge_core::{
    ConciergeError, Conversation, ConversationStatus, ConversationStore, ConversationType,
    GuestIdentity, Message, RoutingLogEntry, SenderType,
};
use tracing::{debug, info};

/// A conversation together with its full message history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConversation {
    pub conversation: Conversation,
    /// Ascending `created_at`, ties in store order.
    pub messages: Vec<Message>,
}

/// Resume-or-create for guests, load-by-id for staff.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn ConversationStore>,
    messages: MessagesConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ConversationStore>, messages: MessagesConfig) -> Self {
        Self { store, messages }
    }

    /// Loads the guest's active conversation of `conversation_type`, creating
    /// it with a welcome message when none exists.
    ///
    /// Two clients of the same guest racing through the create branch both end
    /// up on the winner's conversation: the loser's insert is rejected by the
    /// store and the lookup is repeated.
    pub async fn resume_or_create(
        &self,
        guest: &GuestIdentity,
        conversation_type: ConversationType,
    ) -> Result<LoadedConversation, ConciergeError> {
        if let Some(existing) = self
            .store
            .find_active_conversation(&guest.guest_id, conversation_type)
            .await?
        {
            debug!(
                conversation_id = %existing.id,
                guest_id = %guest.guest_id,
                "resuming active conversation"
            );
            return self.with_history(existing).await;
        }

        let conversation = Conversation::new(guest, conversation_type);
        match self.store.insert_conversation(&conversation).await {
            Ok(()) => {}
            Err(ConciergeError::AlreadyExists { .. }) => {
                debug!(
                    guest_id = %guest.guest_id,
                    %conversation_type,
                    "lost create race; resuming the winner"
                );
                let winner = self
                    .store
                    .find_active_conversation(&guest.guest_id, conversation_type)
                    .await?
                    .ok_or_else(|| ConciergeError::NotFound {
                        entity: "active conversation",
                        id: format!("{}/{conversation_type}", guest.guest_id),
                    })?;
                return self.with_history(winner).await;
            }
            Err(e) => return Err(e),
        }

        let welcome = self.welcome_message(&conversation);
        self.store.insert_message(&welcome).await?;

        info!(
            conversation_id = %conversation.id,
            guest_id = %guest.guest_id,
            %conversation_type,
            handler = %conversation.current_handler,
            "conversation created"
        );

        Ok(LoadedConversation {
            conversation,
            messages: vec![welcome],
        })
    }

    /// Loads a conversation and its history regardless of status or handler.
    pub async fn load_by_id(&self, conversation_id: &str) -> Result<LoadedConversation, ConciergeError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ConciergeError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })?;
        self.with_history(conversation).await
    }

    /// Staff dashboard listing, most recently updated first.
    pub async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ConciergeError> {
        self.store.list_conversations(status).await
    }

    pub async fn routing_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<RoutingLogEntry>, ConciergeError> {
        self.store.routing_log(conversation_id).await
    }

    async fn with_history(
        &self,
        conversation: Conversation,
    ) -> Result<LoadedConversation, ConciergeError> {
        let messages = self.store.messages(&conversation.id).await?;
        Ok(LoadedConversation {
            conversation,
            messages,
        })
    }

    fn welcome_message(&self, conversation: &Conversation) -> Message {
        let first_name = conversation
            .guest_name
            .split_whitespace()
            .next()
            .unwrap_or("there");
        match conversation.conversation_type {
            ConversationType::Assisted => Message::system(
                &conversation.id,
                SenderType::Ai,
                &self.messages.assistant_name,
                format!(
                    "Hi {first_name}! I'm the {}. Ask me about dining, bookings or \
                     anything during your stay. You can ask for a member of staff at any time.",
                    self.messages.assistant_name
                ),
            ),
            ConversationType::Concierge => Message::system(
                &conversation.id,
                SenderType::Staff,
                &self.messages.staff_team_name,
                format!(
                    "Welcome, {first_name}. The {} will be with you shortly.",
                    self.messages.staff_team_name
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::{Handler, MessageType};
    use concierge_test_utils::{MemoryStore, SwitchableStore, guest};

    use super::*;

    fn manager(store: Arc<MemoryStore>) -> SessionManager {
        SessionManager::new(store, MessagesConfig::default())
    }

    #[tokio::test]
    async fn new_assisted_conversation_gets_ai_welcome() {
        let store = Arc::new(MemoryStore::new());
        let loaded = manager(store.clone())
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();

        assert_eq!(loaded.conversation.current_handler, Handler::Ai);
        assert_eq!(loaded.conversation.status, ConversationStatus::Active);
        assert_eq!(loaded.messages.len(), 1);
        let welcome = &loaded.messages[0];
        assert_eq!(welcome.message_type, MessageType::System);
        assert_eq!(welcome.sender_type, SenderType::Ai);
        assert_eq!(welcome.sender_name, "AI Assistant");
        assert_eq!(
            store.messages(&loaded.conversation.id).await.unwrap(),
            loaded.messages
        );
    }

    #[tokio::test]
    async fn new_concierge_conversation_gets_staff_welcome() {
        let store = Arc::new(MemoryStore::new());
        let loaded = manager(store)
            .resume_or_create(&guest("g-1"), ConversationType::Concierge)
            .await
            .unwrap();

        assert_eq!(loaded.conversation.current_handler, Handler::Human);
        assert_eq!(loaded.messages[0].sender_type, SenderType::Staff);
        assert_eq!(loaded.messages[0].sender_name, "Concierge Team");
    }

    #[tokio::test]
    async fn sequential_resume_returns_the_same_conversation() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone());
        let first = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();
        let second = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();

        assert_eq!(first.conversation.id, second.conversation.id);
        // No second welcome on resume.
        assert_eq!(second.messages.len(), 1);
        assert_eq!(store.list_conversations(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn types_are_resumed_independently() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store);
        let assisted = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();
        let concierge = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Concierge)
            .await
            .unwrap();
        assert_ne!(assisted.conversation.id, concierge.conversation.id);
    }

    #[tokio::test]
    async fn escalated_conversation_is_not_resumed() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone());
        let first = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();
        store.force_status(&first.conversation.id, ConversationStatus::Escalated);

        let second = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap();
        assert_ne!(first.conversation.id, second.conversation.id);
    }

    #[tokio::test]
    async fn concurrent_creates_converge_on_one_conversation() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone());
        let (g1, g2) = (guest("g-1"), guest("g-1"));
        let (a, b) = tokio::join!(
            sessions.resume_or_create(&g1, ConversationType::Assisted),
            sessions.resume_or_create(&g2, ConversationType::Assisted),
        );
        assert_eq!(a.unwrap().conversation.id, b.unwrap().conversation.id);
        assert_eq!(store.list_conversations(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_by_id_reports_missing_conversation() {
        let store = Arc::new(MemoryStore::new());
        let err = manager(store).load_by_id("nope").await.unwrap_err();
        assert!(matches!(err, ConciergeError::NotFound { entity: "conversation", .. }));
    }

    #[tokio::test]
    async fn load_by_id_returns_history_in_order() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone());
        let created = sessions
            .resume_or_create(&guest("g-1"), ConversationType::Concierge)
            .await
            .unwrap();
        let id = created.conversation.id.clone();
        for text in ["one", "two"] {
            store
                .insert_message(&Message::text(&id, SenderType::Guest, None, "Ada", text))
                .await
                .unwrap();
        }

        let loaded = sessions.load_by_id(&id).await.unwrap();
        let contents: Vec<_> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[1..], ["one", "two"]);
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let store = Arc::new(SwitchableStore::new(Arc::new(MemoryStore::new())));
        store.fail_reads(true);
        let err = SessionManager::new(store, MessagesConfig::default())
            .resume_or_create(&guest("g-1"), ConversationType::Assisted)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
