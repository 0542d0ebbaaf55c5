// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegate adapter trait for the remote automated assistant.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DelegateRequest;

/// Adapter for the automated assistant that answers guests while it is the
/// active handler.
///
/// `invoke` only reports whether the assistant accepted the request. The reply
/// itself is written to the durable store by the assistant and reaches clients
/// through the normal message feed.
#[async_trait]
pub trait DelegateAdapter: PluginAdapter {
    /// Forwards a guest message to the assistant.
    async fn invoke(&self, request: &DelegateRequest) -> Result<(), ConciergeError>;
}
