// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer-facing conversation view.
//!
//! A [`ConversationView`] ties one client session to one conversation at a
//! time. Opening a conversation loads it through the [`SessionManager`],
//! starts a message [`ChannelMultiplexer`] and a row watcher, and publishes
//! the result as [`ConversationState`] on a `watch` channel. Switching or
//! closing tears both down before anything else happens; dropping the view
//! aborts them.

use std::sync::Arc;

use concierge_core::{
    ChangeEvent, ChangeFilter, ConciergeError, Conversation, ConversationType, Handler,
    HandoffReason, Message, SenderType, Subscription,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel_mux::{ChannelMultiplexer, DeliveryChannel, MessageSource};
use crate::context::{Actor, SessionContext};
use crate::delegation::{DelegateBridge, DelegateOutcome};
use crate::handoff::HandoffController;
use crate::session::{LoadedConversation, SessionManager};

/// Observable state of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub conversation: Option<Conversation>,
    /// Merged history, ascending `created_at`.
    pub messages: Vec<Message>,
    pub is_loading: bool,
    /// Set while the assistant is expected to answer a guest message.
    pub is_typing: bool,
    pub current_handler: Option<Handler>,
}

impl ConversationState {
    /// Adopts `conversation` unless the view already holds a newer version.
    fn adopt(&mut self, conversation: Conversation) -> bool {
        match &self.conversation {
            Some(current)
                if current.id != conversation.id || current.version > conversation.version =>
            {
                false
            }
            _ => {
                self.current_handler = Some(conversation.current_handler);
                self.conversation = Some(conversation);
                true
            }
        }
    }
}

/// Feed tasks of the open conversation.
struct ActiveFeed {
    conversation_id: String,
    messages: ChannelMultiplexer,
    watcher: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ActiveFeed {
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.watcher.await
            && !e.is_cancelled()
        {
            warn!(conversation_id = %self.conversation_id, error = %e, "row watcher panicked");
        }
        self.messages.shutdown().await;
    }

    fn abort(self) {
        self.cancel.cancel();
        self.watcher.abort();
    }
}

pub struct ConversationView {
    ctx: SessionContext,
    sessions: SessionManager,
    handoff: HandoffController,
    bridge: DelegateBridge,
    state: Arc<watch::Sender<ConversationState>>,
    feed: Option<ActiveFeed>,
}

impl ConversationView {
    /// A view with no conversation open.
    pub fn new(ctx: SessionContext) -> Self {
        let sessions = SessionManager::new(Arc::clone(&ctx.store), ctx.messages.clone());
        let handoff = HandoffController::new(Arc::clone(&ctx.store), ctx.messages.clone());
        let bridge = DelegateBridge::new(
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.delegate),
            ctx.messages.clone(),
        );
        let (state, _) = watch::channel(ConversationState::default());
        Self {
            ctx,
            sessions,
            handoff,
            bridge,
            state: Arc::new(state),
            feed: None,
        }
    }

    /// Resumes or creates the guest's conversation of `conversation_type`.
    pub async fn open_guest(
        ctx: SessionContext,
        conversation_type: ConversationType,
    ) -> Result<Self, ConciergeError> {
        let Actor::Guest(guest) = ctx.actor.clone() else {
            return Err(ConciergeError::Internal(format!(
                "{} cannot open a guest conversation",
                ctx.actor.describe()
            )));
        };
        let mut view = Self::new(ctx);
        view.begin_loading();
        let loaded = view
            .finish_loading(view.sessions.resume_or_create(&guest, conversation_type).await)?;
        view.attach(loaded);
        Ok(view)
    }

    /// Opens any conversation by id.
    pub async fn open_staff(
        ctx: SessionContext,
        conversation_id: &str,
    ) -> Result<Self, ConciergeError> {
        let mut view = Self::new(ctx);
        view.switch_conversation(conversation_id).await?;
        Ok(view)
    }

    /// Receiver for state changes. Starts out marked as seen.
    pub fn state(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    pub fn actor(&self) -> &Actor {
        &self.ctx.actor
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.feed.as_ref().map(|feed| feed.conversation_id.as_str())
    }

    /// Sends a message as the view's actor.
    ///
    /// Guest messages are handed to the assistant while it is the handler; a
    /// failing assistant escalates the conversation before this returns. Staff
    /// may only send while a human is the handler.
    pub async fn send_message(&self, content: &str) -> Result<Message, ConciergeError> {
        let conversation_id = self.require_open()?.to_string();
        match &self.ctx.actor {
            Actor::Guest(guest) => {
                let message = Message::text(
                    &conversation_id,
                    SenderType::Guest,
                    Some(guest.guest_id.clone()),
                    &guest.name,
                    content,
                );
                self.state.send_if_modified(|s| {
                    let expect_reply = s.current_handler == Some(Handler::Ai);
                    let changed = s.is_typing != expect_reply;
                    s.is_typing = expect_reply;
                    changed
                });

                if let Err(e) = self.ctx.store.insert_message(&message).await {
                    self.set_typing(false);
                    return Err(e);
                }

                match self.bridge.forward(&message).await {
                    Ok(DelegateOutcome::Forwarded) => {}
                    Ok(DelegateOutcome::Skipped) => self.set_typing(false),
                    Ok(DelegateOutcome::Escalated(conversation)) => {
                        self.set_typing(false);
                        self.apply_conversation(conversation);
                    }
                    Err(e) => {
                        // The message itself is stored; only the hand-off failed.
                        self.set_typing(false);
                        error!(
                            conversation_id = %conversation_id,
                            error = %e,
                            "guest message stored but not handed off"
                        );
                    }
                }
                Ok(message)
            }
            Actor::Staff(staff) => {
                let conversation = self.fresh_conversation(&conversation_id).await?;
                if conversation.current_handler != Handler::Human {
                    return Err(ConciergeError::NotActiveHandler {
                        conversation_id,
                        actor: self.ctx.actor.describe(),
                        handler: conversation.current_handler,
                    });
                }
                let message = Message::text(
                    &conversation_id,
                    SenderType::Staff,
                    Some(staff.staff_id.clone()),
                    &staff.name,
                    content,
                );
                self.ctx.store.insert_message(&message).await?;
                Ok(message)
            }
        }
    }

    /// Escalates the open conversation. `None` records "Guest Request".
    pub async fn escalate_to_human(
        &self,
        reason: Option<String>,
    ) -> Result<Conversation, ConciergeError> {
        let conversation_id = self.require_open()?.to_string();
        let reason = reason.map_or(HandoffReason::GuestRequest, HandoffReason::from);
        let updated = self.handoff.escalate(&conversation_id, reason).await?;
        self.apply_conversation(updated.clone());
        Ok(updated)
    }

    /// Takes over `conversation_id`, or the open conversation when `None`.
    ///
    /// Taking over a different conversation also switches the view to it.
    pub async fn take_over_conversation(
        &mut self,
        conversation_id: Option<&str>,
    ) -> Result<Conversation, ConciergeError> {
        let Actor::Staff(staff) = &self.ctx.actor else {
            return Err(ConciergeError::Internal(format!(
                "{} cannot take over conversations",
                self.ctx.actor.describe()
            )));
        };
        let target = match conversation_id {
            Some(id) => id.to_string(),
            None => self.require_open()?.to_string(),
        };

        let updated = self.handoff.takeover(&target, staff).await?;
        if self.conversation_id() == Some(target.as_str()) {
            self.apply_conversation(updated.clone());
        } else {
            self.switch_conversation(&target).await?;
        }
        Ok(updated)
    }

    /// Tears down the open conversation's feed and loads `conversation_id`.
    ///
    /// On failure the view is left with no conversation open.
    pub async fn switch_conversation(&mut self, conversation_id: &str) -> Result<(), ConciergeError> {
        self.teardown().await;
        self.begin_loading();
        let loaded = self.finish_loading(self.sessions.load_by_id(conversation_id).await)?;
        self.attach(loaded);
        Ok(())
    }

    /// Re-reads the conversation row, for callers that cannot rely on push.
    pub async fn refresh(&self) -> Result<(), ConciergeError> {
        let conversation_id = self.require_open()?.to_string();
        let conversation = self.fresh_conversation(&conversation_id).await?;
        self.apply_conversation(conversation);
        Ok(())
    }

    /// Stops every feed task and clears the state.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.state.send_replace(ConversationState::default());
    }

    fn require_open(&self) -> Result<&str, ConciergeError> {
        self.conversation_id()
            .ok_or_else(|| ConciergeError::Internal("no conversation is open".to_string()))
    }

    async fn fresh_conversation(&self, conversation_id: &str) -> Result<Conversation, ConciergeError> {
        self.ctx
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ConciergeError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }

    fn begin_loading(&self) {
        self.state.send_replace(ConversationState {
            is_loading: true,
            ..ConversationState::default()
        });
    }

    fn finish_loading(
        &self,
        loaded: Result<LoadedConversation, ConciergeError>,
    ) -> Result<LoadedConversation, ConciergeError> {
        if loaded.is_err() {
            self.state.send_modify(|s| s.is_loading = false);
        }
        loaded
    }

    fn set_typing(&self, typing: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.is_typing != typing;
            s.is_typing = typing;
            changed
        });
    }

    fn apply_conversation(&self, conversation: Conversation) {
        self.state.send_if_modified(|s| s.adopt(conversation));
    }

    fn attach(&mut self, loaded: LoadedConversation) {
        let LoadedConversation {
            conversation,
            messages,
        } = loaded;
        let conversation_id = conversation.id.clone();

        self.state.send_replace(ConversationState {
            current_handler: Some(conversation.current_handler),
            conversation: Some(conversation),
            messages: messages.clone(),
            is_loading: false,
            is_typing: false,
        });

        let state = Arc::clone(&self.state);
        let observer = move |fresh: &[Message], channel: DeliveryChannel, all: &[Message]| {
            let answered = fresh.iter().any(|m| m.sender_type != SenderType::Guest);
            state.send_modify(|s| {
                s.messages = all.to_vec();
                if answered {
                    s.is_typing = false;
                }
            });
            debug!(merged = fresh.len(), ?channel, "messages merged");
        };
        let source = Arc::new(MessageSource::new(
            Arc::clone(&self.ctx.store),
            conversation_id.clone(),
        ));
        let messages = ChannelMultiplexer::start(
            source,
            messages,
            &self.ctx.polling.conversation,
            observer,
        );

        let cancel = CancellationToken::new();
        let rows = self.ctx.store.subscribe(ChangeFilter::Conversation {
            id: conversation_id.clone(),
        });
        let watcher = tokio::spawn(watch_conversation_row(
            rows,
            Arc::clone(&self.state),
            cancel.clone(),
        ));

        info!(
            conversation_id = %conversation_id,
            actor = %self.ctx.actor.describe(),
            "conversation opened"
        );
        self.feed = Some(ActiveFeed {
            conversation_id,
            messages,
            watcher,
            cancel,
        });
    }

    async fn teardown(&mut self) {
        if let Some(feed) = self.feed.take() {
            let conversation_id = feed.conversation_id.clone();
            feed.shutdown().await;
            debug!(conversation_id = %conversation_id, "conversation closed");
        }
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

/// Follows updates of the open conversation row so handler changes made by
/// other actors show up in the state.
async fn watch_conversation_row(
    mut rows: Subscription,
    state: Arc<watch::Sender<ConversationState>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rows.recv() => event,
        };
        match event {
            Some(ChangeEvent::ConversationUpdated(conversation))
            | Some(ChangeEvent::ConversationInserted(conversation)) => {
                state.send_if_modified(|s| s.adopt(conversation));
            }
            Some(_) => {}
            None => break,
        }
    }
}
