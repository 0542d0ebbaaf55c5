// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order and booking status notifications for one user.

use std::sync::Arc;

use concierge_core::{ConciergeError, Notification};
use tokio::sync::watch;
use tracing::debug;

use crate::channel_mux::{ChannelMultiplexer, DeliveryChannel, NotificationSource};
use crate::context::SessionContext;

/// Merged notification list kept current by push and polling
/// (`[polling.notifications]`, 5 s base and 30 s cap by default).
pub struct NotificationFeed {
    user_id: String,
    list: watch::Receiver<Vec<Notification>>,
    mux: Option<ChannelMultiplexer>,
}

impl NotificationFeed {
    /// Loads the user's notifications and starts following new ones.
    pub async fn open(ctx: &SessionContext, user_id: &str) -> Result<Self, ConciergeError> {
        let initial = ctx.store.notifications_since(user_id, None).await?;
        let (tx, list) = watch::channel(initial.clone());

        let source = Arc::new(NotificationSource::new(Arc::clone(&ctx.store), user_id));
        let observer =
            move |fresh: &[Notification], channel: DeliveryChannel, all: &[Notification]| {
                debug!(merged = fresh.len(), ?channel, "notifications merged");
                tx.send_replace(all.to_vec());
            };
        let mux = ChannelMultiplexer::start(source, initial, &ctx.polling.notifications, observer);

        Ok(Self {
            user_id: user_id.to_string(),
            list,
            mux: Some(mux),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Receiver for the merged list, oldest first.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.list.clone()
    }

    pub fn current(&self) -> Vec<Notification> {
        self.list.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.mux.is_some()
    }

    /// Stops push and polling. The last list stays readable.
    pub async fn close(&mut self) {
        if let Some(mux) = self.mux.take() {
            mux.shutdown().await;
        }
    }
}
