// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit session context handed to every engine component.

use std::sync::Arc;

use concierge_config::ConciergeConfig;
use concierge_config::model::{MessagesConfig, PollingConfig};
use concierge_core::{ConversationStore, DelegateAdapter, GuestIdentity, StaffIdentity};

/// Who is driving a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Guest(GuestIdentity),
    Staff(StaffIdentity),
}

impl Actor {
    /// Stable id used in log lines and error messages.
    pub fn id(&self) -> &str {
        match self {
            Actor::Guest(guest) => &guest.guest_id,
            Actor::Staff(staff) => &staff.staff_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Actor::Guest(guest) => &guest.name,
            Actor::Staff(staff) => &staff.name,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Actor::Guest(guest) => format!("guest {}", guest.guest_id),
            Actor::Staff(staff) => format!("staff {}", staff.staff_id),
        }
    }
}

/// Store, delegate, actor and tuning for one client session.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn ConversationStore>,
    pub delegate: Arc<dyn DelegateAdapter>,
    pub actor: Actor,
    pub polling: PollingConfig,
    pub messages: MessagesConfig,
}

impl SessionContext {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        delegate: Arc<dyn DelegateAdapter>,
        actor: Actor,
        config: &ConciergeConfig,
    ) -> Self {
        Self {
            store,
            delegate,
            actor,
            polling: config.polling.clone(),
            messages: config.messages.clone(),
        }
    }

    /// Same store, delegate and tuning, different actor.
    pub fn with_actor(&self, actor: Actor) -> Self {
        Self {
            actor,
            ..self.clone()
        }
    }
}
