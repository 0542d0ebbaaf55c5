// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge between guest messages and the automated assistant.
//!
//! The bridge forwards a guest message only while the assistant is the
//! active handler, read fresh from the store at decision time. The reply is
//! never returned here; the assistant writes it to the store and it reaches
//! the view through the message feed.
//!
//! Any delegate failure is answered with an apology system message followed by
//! an escalation with reason "AI Error". This is the only self-healing path in
//! the engine.

use std::sync::Arc;

use concierge_config::model::MessagesConfig;
use concierge_core::{
    ConciergeError, Conversation, ConversationStore, DelegateAdapter, DelegateRequest, Handler,
    HandoffReason, Message, SenderType,
};
use tracing::{debug, info, warn};

use crate::handoff::HandoffController;

/// What the bridge did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateOutcome {
    /// Not a guest message, or the assistant is no longer the handler.
    Skipped,
    /// The assistant accepted the message; its reply arrives through the feed.
    Forwarded,
    /// The assistant failed and the conversation was handed to staff.
    Escalated(Conversation),
}

#[derive(Clone)]
pub struct DelegateBridge {
    store: Arc<dyn ConversationStore>,
    delegate: Arc<dyn DelegateAdapter>,
    handoff: HandoffController,
    messages: MessagesConfig,
}

impl DelegateBridge {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        delegate: Arc<dyn DelegateAdapter>,
        messages: MessagesConfig,
    ) -> Self {
        let handoff = HandoffController::new(Arc::clone(&store), messages.clone());
        Self {
            store,
            delegate,
            handoff,
            messages,
        }
    }

    /// Hands `message` to the assistant if it is still answering this conversation.
    ///
    /// Errors are returned only when the store fails or the fallback
    /// escalation loses a race; a delegate failure alone is absorbed into
    /// [`DelegateOutcome::Escalated`].
    pub async fn forward(&self, message: &Message) -> Result<DelegateOutcome, ConciergeError> {
        if message.sender_type != SenderType::Guest {
            return Ok(DelegateOutcome::Skipped);
        }

        let conversation = self
            .store
            .get_conversation(&message.conversation_id)
            .await?
            .ok_or_else(|| ConciergeError::NotFound {
                entity: "conversation",
                id: message.conversation_id.clone(),
            })?;
        if conversation.current_handler != Handler::Ai {
            debug!(
                conversation_id = %conversation.id,
                handler = %conversation.current_handler,
                "assistant is not the handler; not forwarding"
            );
            return Ok(DelegateOutcome::Skipped);
        }

        let request = DelegateRequest {
            message: message.content.clone(),
            user_id: conversation.guest_id.clone(),
            user_name: conversation.guest_name.clone(),
            room_number: conversation.room_number.clone(),
            conversation_id: conversation.id.clone(),
        };

        match self.delegate.invoke(&request).await {
            Ok(()) => {
                debug!(conversation_id = %conversation.id, "message forwarded to assistant");
                Ok(DelegateOutcome::Forwarded)
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    delegate = self.delegate.name(),
                    error = %e,
                    "assistant failed; escalating to staff"
                );
                self.recover(&conversation).await
            }
        }
    }

    async fn recover(&self, conversation: &Conversation) -> Result<DelegateOutcome, ConciergeError> {
        let apology = Message::system(
            &conversation.id,
            SenderType::Ai,
            &self.messages.assistant_name,
            "Sorry, I'm having trouble answering right now. Let me get someone from our team to help.",
        );
        if let Err(e) = self.store.insert_message(&apology).await {
            warn!(conversation_id = %conversation.id, error = %e, "apology not written");
        }

        let escalated = self
            .handoff
            .escalate(&conversation.id, HandoffReason::AiError)
            .await?;
        info!(conversation_id = %conversation.id, "recovered from assistant failure");
        Ok(DelegateOutcome::Escalated(escalated))
    }
}
