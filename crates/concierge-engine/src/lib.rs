// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation synchronization and handoff engine for Concierge.
//!
//! Guest and staff clients share nothing but the durable store. This crate
//! keeps each client's view of a conversation current and arbitrates who
//! answers the guest:
//! - [`SessionManager`] resumes or creates guest conversations and loads them
//!   for staff;
//! - [`ChannelMultiplexer`] merges the store's push feed with adaptive polling
//!   into one ordered, de-duplicated list;
//! - [`HandoffController`] performs escalation and takeover with optimistic
//!   concurrency and an audit entry per transition;
//! - [`DelegateBridge`] hands guest messages to the assistant and escalates
//!   when it fails;
//! - [`ConversationView`] and [`NotificationFeed`] are what clients hold.

pub mod backoff;
pub mod channel_mux;
pub mod context;
pub mod delegation;
pub mod handoff;
pub mod notifications;
pub mod session;
pub mod shutdown;
pub mod view;

use std::sync::Arc;

use concierge_config::ConciergeConfig;
use concierge_core::{
    ConciergeError, ConversationStore, DelegateAdapter, GuestIdentity, StaffIdentity,
};
use tracing::{info, warn};

pub use backoff::PollBackoff;
pub use channel_mux::{ChannelMultiplexer, DeliveryChannel, FeedItem, FeedSource, MergedLog};
pub use context::{Actor, SessionContext};
pub use delegation::{DelegateBridge, DelegateOutcome};
pub use handoff::HandoffController;
pub use notifications::NotificationFeed;
pub use session::{LoadedConversation, SessionManager};
pub use view::{ConversationState, ConversationView};

/// Owns the shared adapters and hands out per-actor session contexts.
pub struct ConciergeEngine {
    store: Arc<dyn ConversationStore>,
    delegate: Arc<dyn DelegateAdapter>,
    config: ConciergeConfig,
}

impl ConciergeEngine {
    /// Initializes the store and wraps both adapters.
    pub async fn start(
        store: Arc<dyn ConversationStore>,
        delegate: Arc<dyn DelegateAdapter>,
        config: ConciergeConfig,
    ) -> Result<Self, ConciergeError> {
        store.initialize().await?;
        info!(
            store = store.name(),
            delegate = delegate.name(),
            "concierge engine started"
        );
        Ok(Self {
            store,
            delegate,
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn delegate(&self) -> &Arc<dyn DelegateAdapter> {
        &self.delegate
    }

    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    pub fn context(&self, actor: Actor) -> SessionContext {
        SessionContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.delegate),
            actor,
            &self.config,
        )
    }

    pub fn guest_context(&self, guest: GuestIdentity) -> SessionContext {
        self.context(Actor::Guest(guest))
    }

    pub fn staff_context(&self, staff: StaffIdentity) -> SessionContext {
        self.context(Actor::Staff(staff))
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(Arc::clone(&self.store), self.config.messages.clone())
    }

    pub fn handoff(&self) -> HandoffController {
        HandoffController::new(Arc::clone(&self.store), self.config.messages.clone())
    }

    /// Shuts both adapters down. Open views should be closed first.
    pub async fn shutdown(&self) {
        if let Err(e) = self.delegate.shutdown().await {
            warn!(error = %e, "delegate shutdown failed");
        }
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "store close failed");
        }
        info!("concierge engine stopped");
    }
}
