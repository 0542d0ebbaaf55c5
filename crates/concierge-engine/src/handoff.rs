// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff controller: the only writer of a conversation's handler fields.
//!
//! State machine over `(status, current_handler)`:
//!
//! ```text
//!   ai/active ──escalate──▶ human/escalated
//!       │                        │
//!       └───────takeover─────────┴──▶ human/active (staff assigned)
//! ```
//!
//! There is no transition back to `ai`. Every transition is one conditional
//! update against the state that was read, followed by one routing log entry.
//! A lost race surfaces as [`ConciergeError::TransitionConflict`] and writes
//! nothing.

use std::sync::Arc;

use concierge_config::model::MessagesConfig;
use concierge_core::{
    ConciergeError, Conversation, ConversationStatus, ConversationStore, Handler,
    HandlerTransition, HandoffReason, Message, RoutingLogEntry, SenderType, StaffIdentity,
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct HandoffController {
    store: Arc<dyn ConversationStore>,
    messages: MessagesConfig,
}

impl HandoffController {
    pub fn new(store: Arc<dyn ConversationStore>, messages: MessagesConfig) -> Self {
        Self { store, messages }
    }

    /// Hands an assistant-led conversation to the staff queue.
    ///
    /// Requires `current_handler = ai`. On success the guest is told a person
    /// will pick the conversation up. The transition stands even if that
    /// notice cannot be written.
    pub async fn escalate(
        &self,
        conversation_id: &str,
        reason: HandoffReason,
    ) -> Result<Conversation, ConciergeError> {
        let current = self.load(conversation_id).await?;
        if current.current_handler != Handler::Ai {
            return Err(ConciergeError::InvalidTransition {
                conversation_id: conversation_id.to_string(),
                handler: current.current_handler,
                status: current.status,
                reason: "only assistant-handled conversations can be escalated".to_string(),
            });
        }

        let transition = HandlerTransition {
            conversation_id: conversation_id.to_string(),
            expected: current.handler_state(),
            current_handler: Handler::Human,
            status: ConversationStatus::Escalated,
            assigned_staff_id: None,
        };
        let updated = self.commit(&transition, reason.clone(), None).await?;

        let notice = Message::system(
            conversation_id,
            SenderType::Ai,
            &self.messages.assistant_name,
            format!(
                "I've passed your conversation to the {}. A member of staff will assist you shortly.",
                self.messages.staff_team_name
            ),
        );
        if let Err(e) = self.store.insert_message(&notice).await {
            warn!(
                conversation_id,
                error = %e,
                "escalated, but the guest notice was not written"
            );
        }

        info!(
            conversation_id,
            %reason,
            version = updated.version,
            "conversation escalated to staff"
        );
        Ok(updated)
    }

    /// Assigns `staff` and makes them the active handler.
    ///
    /// Allowed from `ai/active` and `human/escalated`; refused once any staff
    /// member has taken the conversation.
    pub async fn takeover(
        &self,
        conversation_id: &str,
        staff: &StaffIdentity,
    ) -> Result<Conversation, ConciergeError> {
        let current = self.load(conversation_id).await?;
        if let Some(assigned) = &current.assigned_staff_id {
            return Err(ConciergeError::InvalidTransition {
                conversation_id: conversation_id.to_string(),
                handler: current.current_handler,
                status: current.status,
                reason: format!("already taken over by staff {assigned}"),
            });
        }

        let transition = HandlerTransition {
            conversation_id: conversation_id.to_string(),
            expected: current.handler_state(),
            current_handler: Handler::Human,
            status: ConversationStatus::Active,
            assigned_staff_id: Some(staff.staff_id.clone()),
        };
        let updated = self
            .commit(
                &transition,
                HandoffReason::StaffTakeover,
                Some(staff.staff_id.clone()),
            )
            .await?;

        info!(
            conversation_id,
            staff_id = %staff.staff_id,
            from = %current.current_handler,
            version = updated.version,
            "conversation taken over"
        );
        Ok(updated)
    }

    async fn load(&self, conversation_id: &str) -> Result<Conversation, ConciergeError> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ConciergeError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }

    /// Conditional update, then the audit entry. Nothing is logged when the
    /// update matched no row.
    async fn commit(
        &self,
        transition: &HandlerTransition,
        reason: HandoffReason,
        staff_id: Option<String>,
    ) -> Result<Conversation, ConciergeError> {
        let Some(updated) = self.store.apply_transition(transition).await? else {
            warn!(
                conversation_id = %transition.conversation_id,
                expected_version = transition.expected.version,
                "handler transition lost a race"
            );
            return Err(ConciergeError::TransitionConflict {
                conversation_id: transition.conversation_id.clone(),
            });
        };

        let entry = RoutingLogEntry::new(
            &transition.conversation_id,
            transition.expected.current_handler,
            transition.current_handler,
            reason,
            staff_id,
        );
        self.store.append_routing_log(&entry).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::{ConversationType, MessageType};
    use concierge_test_utils::{MemoryStore, SwitchableStore, guest, staff};
    use tracing_test::traced_test;

    use super::*;

    async fn seeded(conversation_type: ConversationType) -> (Arc<MemoryStore>, Conversation) {
        let store = Arc::new(MemoryStore::new());
        let conv = Conversation::new(&guest("g-1"), conversation_type);
        store.insert_conversation(&conv).await.unwrap();
        (store, conv)
    }

    fn controller(store: Arc<MemoryStore>) -> HandoffController {
        HandoffController::new(store, MessagesConfig::default())
    }

    #[tokio::test]
    #[traced_test]
    async fn escalate_moves_to_human_and_audits() {
        let (store, conv) = seeded(ConversationType::Assisted).await;
        let updated = controller(store.clone())
            .escalate(&conv.id, HandoffReason::GuestRequest)
            .await
            .unwrap();

        assert_eq!(updated.current_handler, Handler::Human);
        assert_eq!(updated.status, ConversationStatus::Escalated);
        assert_eq!(updated.version, conv.version + 1);

        let log = store.routing_log(&conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from_handler, Handler::Ai);
        assert_eq!(log[0].to_handler, Handler::Human);
        assert_eq!(log[0].reason, HandoffReason::GuestRequest);
        assert_eq!(log[0].staff_id, None);

        let messages = store.messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, MessageType::System);
        assert!(logs_contain("conversation escalated to staff"));
    }

    #[tokio::test]
    #[traced_test]
    async fn escalation_stands_when_the_notice_cannot_be_written() {
        let (memory, conv) = seeded(ConversationType::Assisted).await;
        let store = Arc::new(SwitchableStore::new(memory));
        store.fail_message_inserts(true);

        let updated = HandoffController::new(store.clone(), MessagesConfig::default())
            .escalate(&conv.id, HandoffReason::AiError)
            .await
            .unwrap();

        assert_eq!(updated.status, ConversationStatus::Escalated);
        let stored = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConversationStatus::Escalated);
        assert_eq!(store.routing_log(&conv.id).await.unwrap().len(), 1);
        assert!(store.messages(&conv.id).await.unwrap().is_empty());
        assert!(logs_contain("guest notice was not written"));
    }

    #[tokio::test]
    async fn escalate_keeps_free_text_reason() {
        let (store, conv) = seeded(ConversationType::Assisted).await;
        controller(store.clone())
            .escalate(&conv.id, HandoffReason::Other("Allergy question".into()))
            .await
            .unwrap();
        let log = store.routing_log(&conv.id).await.unwrap();
        assert_eq!(log[0].reason.to_string(), "Allergy question");
    }

    #[tokio::test]
    async fn escalate_refuses_human_handled_conversation() {
        let (store, conv) = seeded(ConversationType::Concierge).await;
        let err = controller(store.clone())
            .escalate(&conv.id, HandoffReason::GuestRequest)
            .await
            .unwrap_err();

        assert!(matches!(err, ConciergeError::InvalidTransition { handler: Handler::Human, .. }));
        assert!(store.routing_log(&conv.id).await.unwrap().is_empty());
        assert!(store.messages(&conv.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn takeover_assigns_staff_and_reactivates() {
        let (store, conv) = seeded(ConversationType::Assisted).await;
        let handoff = controller(store.clone());
        handoff
            .escalate(&conv.id, HandoffReason::AiError)
            .await
            .unwrap();
        let updated = handoff.takeover(&conv.id, &staff("s-1")).await.unwrap();

        assert_eq!(updated.current_handler, Handler::Human);
        assert_eq!(updated.status, ConversationStatus::Active);
        assert_eq!(updated.assigned_staff_id.as_deref(), Some("s-1"));

        let log = store.routing_log(&conv.id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].reason, HandoffReason::StaffTakeover);
        assert_eq!(log[1].from_handler, Handler::Human);
        assert_eq!(log[1].staff_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn takeover_straight_from_the_assistant() {
        let (store, conv) = seeded(ConversationType::Assisted).await;
        let updated = controller(store.clone())
            .takeover(&conv.id, &staff("s-1"))
            .await
            .unwrap();
        assert_eq!(updated.current_handler, Handler::Human);
        let log = store.routing_log(&conv.id).await.unwrap();
        assert_eq!(log[0].from_handler, Handler::Ai);
        // Takeover posts no guest-facing notice.
        assert!(store.messages(&conv.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_takeover_is_refused() {
        let (store, conv) = seeded(ConversationType::Concierge).await;
        let handoff = controller(store.clone());
        handoff.takeover(&conv.id, &staff("s-1")).await.unwrap();
        let err = handoff.takeover(&conv.id, &staff("s-2")).await.unwrap_err();

        assert!(matches!(err, ConciergeError::InvalidTransition { .. }));
        let current = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(current.assigned_staff_id.as_deref(), Some("s-1"));
        assert_eq!(store.routing_log(&conv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = controller(store)
            .takeover("missing", &staff("s-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_escalate_and_takeover_have_one_winner() {
        let (store, conv) = seeded(ConversationType::Assisted).await;
        let handoff = controller(store.clone());
        let s1 = staff("s-1");
        let (escalated, taken) = tokio::join!(
            handoff.escalate(&conv.id, HandoffReason::GuestRequest),
            handoff.takeover(&conv.id, &s1),
        );

        let outcomes = [escalated.is_ok(), taken.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = escalated.err().or(taken.err()).unwrap();
        assert!(matches!(loser, ConciergeError::TransitionConflict { .. }));
        assert_eq!(store.routing_log(&conv.id).await.unwrap().len(), 1);
    }
}
