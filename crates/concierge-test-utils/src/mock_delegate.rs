// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock assistant delegate for deterministic testing.
//!
//! `MockDelegate` implements `DelegateAdapter` without any network. When
//! replying it writes the assistant's answer straight into the store, the way
//! the real serverless function does, so the reply reaches clients through
//! the normal message feed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concierge_core::{
    AdapterType, ConciergeError, ConversationStore, DelegateAdapter, DelegateRequest,
    HealthStatus, Message, PluginAdapter, SenderType,
};

/// How the mock answers the next invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateBehavior {
    /// Succeed and insert an assistant message with this content.
    Reply(String),
    /// Succeed without writing anything.
    Accept,
    /// Fail with a delegate error carrying this message.
    Fail(String),
}

pub struct MockDelegate {
    store: Option<Arc<dyn ConversationStore>>,
    behavior: Mutex<DelegateBehavior>,
    requests: Mutex<Vec<DelegateRequest>>,
}

impl MockDelegate {
    /// Replies to every request with `reply`, written to `store`.
    pub fn replying(store: Arc<dyn ConversationStore>, reply: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            behavior: Mutex::new(DelegateBehavior::Reply(reply.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::detached(DelegateBehavior::Accept)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::detached(DelegateBehavior::Fail(message.into()))
    }

    fn detached(behavior: DelegateBehavior) -> Self {
        Self {
            store: None,
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: DelegateBehavior) {
        *self.behavior.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<DelegateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PluginAdapter for MockDelegate {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Delegate
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl DelegateAdapter for MockDelegate {
    async fn invoke(&self, request: &DelegateRequest) -> Result<(), ConciergeError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match behavior {
            DelegateBehavior::Accept => Ok(()),
            DelegateBehavior::Fail(message) => Err(ConciergeError::Delegate {
                message,
                source: None,
            }),
            DelegateBehavior::Reply(content) => {
                let Some(store) = &self.store else {
                    return Err(ConciergeError::Internal(
                        "mock delegate has no store to reply into".into(),
                    ));
                };
                let reply = Message::text(
                    &request.conversation_id,
                    SenderType::Ai,
                    None,
                    "AI Assistant",
                    content,
                );
                store
                    .insert_message(&reply)
                    .await
                    .map_err(|e| ConciergeError::Delegate {
                        message: "assistant could not store its reply".into(),
                        source: Some(Box::new(e)),
                    })
            }
        }
    }
}
