// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP adapter for the automated assistant.
//!
//! This crate implements [`DelegateAdapter`] by POSTing each guest message to
//! a serverless function. The function writes its reply into the store, where
//! the engine's feeds pick it up like any other message.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use concierge_config::model::DelegateConfig;
use concierge_core::error::ConciergeError;
use concierge_core::traits::{DelegateAdapter, PluginAdapter};
use concierge_core::types::{AdapterType, DelegateRequest, HealthStatus};
use tracing::{info, warn};

use crate::client::DelegateClient;

/// Assistant function reached over HTTP.
///
/// Without a configured endpoint every invocation fails, which the engine
/// turns into an apology and an escalation to staff.
pub struct HttpDelegate {
    client: Option<DelegateClient>,
}

impl HttpDelegate {
    /// Creates the delegate from configuration.
    ///
    /// `api_key` (or `CONCIERGE_DELEGATE_API_KEY`) is sent as a bearer token;
    /// without one requests go out unauthenticated.
    pub fn new(config: &DelegateConfig) -> Result<Self, ConciergeError> {
        let client = match &config.endpoint {
            Some(endpoint) => {
                let client = DelegateClient::new(
                    endpoint.clone(),
                    config.api_key.as_deref(),
                    Duration::from_secs(config.timeout_secs),
                )?;
                info!(endpoint = %endpoint, timeout_secs = config.timeout_secs, "HTTP delegate initialized");
                Some(client)
            }
            None => {
                warn!("no delegate endpoint configured; assisted conversations will escalate");
                None
            }
        };
        Ok(Self { client })
    }

    /// Creates a delegate with an existing client (for testing).
    #[cfg(test)]
    fn with_client(client: DelegateClient) -> Self {
        Self {
            client: Some(client),
        }
    }
}

#[async_trait]
impl PluginAdapter for HttpDelegate {
    fn name(&self) -> &str {
        "http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Delegate
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(match &self.client {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Degraded("no delegate endpoint configured".into()),
        })
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl DelegateAdapter for HttpDelegate {
    async fn invoke(&self, request: &DelegateRequest) -> Result<(), ConciergeError> {
        let client = self.client.as_ref().ok_or_else(|| ConciergeError::Delegate {
            message: "no delegate endpoint configured".into(),
            source: None,
        })?;
        client.invoke(request).await
    }
}
