// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by the store and the delegate.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::types::{AdapterType, HealthStatus};

/// Supertrait of [`ConversationStore`](super::ConversationStore) and
/// [`DelegateAdapter`](super::DelegateAdapter).
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short backend name used in log fields, e.g. `sqlite` or `http`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// `Degraded` means usable with reduced function, such as a delegate
    /// with no endpoint or a store whose push feed is down.
    async fn health_check(&self) -> Result<HealthStatus, ConciergeError>;

    /// Flushes and releases resources. Called once by `ConciergeEngine::shutdown`.
    async fn shutdown(&self) -> Result<(), ConciergeError>;
}
