// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the assistant serverless function.
//!
//! Provides [`DelegateClient`] which handles authentication, the request
//! body, the transport timeout, and mapping of non-success responses.

use std::time::Duration;

use concierge_core::{ConciergeError, DelegateRequest};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::InvokeResponse;

/// HTTP client for one assistant function endpoint.
///
/// A request is sent exactly once. The function writes to the store as a
/// side effect, so a blind retry could post the reply twice.
#[derive(Debug, Clone)]
pub struct DelegateClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DelegateClient {
    /// Creates a new client.
    ///
    /// # Arguments
    /// * `endpoint` - Function URL
    /// * `api_key` - Optional bearer token
    /// * `timeout` - Transport timeout for a whole invocation
    pub fn new(
        endpoint: String,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ConciergeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ConciergeError::Config(format!("invalid delegate API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ConciergeError::Delegate {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts `request` and checks the reply.
    ///
    /// Non-2xx statuses, unreadable bodies, and bodies carrying an `error`
    /// field are all failures. An empty 2xx body is success.
    pub async fn invoke(&self, request: &DelegateRequest) -> Result<(), ConciergeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status = %status, conversation_id = %request.conversation_id, "delegate responded");

        if !status.is_success() {
            let detail = serde_json::from_str::<InvokeResponse>(&body)
                .ok()
                .and_then(|r| r.failure())
                .unwrap_or(body);
            return Err(ConciergeError::Delegate {
                message: format!("assistant returned {status}: {detail}"),
                source: None,
            });
        }

        if body.trim().is_empty() {
            return Ok(());
        }

        let parsed: InvokeResponse =
            serde_json::from_str(&body).map_err(|e| ConciergeError::Delegate {
                message: format!("failed to parse assistant response: {e}"),
                source: Some(Box::new(e)),
            })?;

        match parsed.failure() {
            Some(message) => Err(ConciergeError::Delegate {
                message: format!("assistant reported an error: {message}"),
                source: None,
            }),
            None => Ok(()),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ConciergeError {
        if e.is_timeout() {
            ConciergeError::Timeout {
                duration: self.timeout,
            }
        } else {
            ConciergeError::Delegate {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}
