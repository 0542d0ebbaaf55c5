// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for engine and end-to-end tests.
//!
//! `TestHarness` assembles a store (in memory, or SQLite in a temp dir)
//! behind a [`SwitchableStore`], a [`MockDelegate`], and a configuration with
//! millisecond poll intervals.

use std::sync::Arc;
use std::time::Duration;

use concierge_config::ConciergeConfig;
use concierge_config::model::{PollProfile, StorageConfig};
use concierge_core::{ConciergeError, ConversationStore, DelegateAdapter};
use concierge_storage::SqliteStore;
use tokio::sync::watch;

use crate::memory_store::MemoryStore;
use crate::mock_delegate::{DelegateBehavior, MockDelegate};
use crate::switchable::SwitchableStore;

/// Poll profile for tests: 50 ms base, 200 ms cap.
pub fn fast_polling() -> PollProfile {
    PollProfile {
        base_interval_ms: 50,
        max_interval_ms: 200,
        multiplier: 1.5,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    sqlite: bool,
    behavior: DelegateBehavior,
    polling: PollProfile,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite: false,
            behavior: DelegateBehavior::Reply("Happy to help with that!".to_string()),
            polling: fast_polling(),
        }
    }

    /// Back the harness with a SQLite database in a temp dir.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub fn with_delegate(mut self, behavior: DelegateBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Poll profile for both the conversation and the notification feed.
    pub fn with_polling(mut self, polling: PollProfile) -> Self {
        self.polling = polling;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ConciergeError> {
        let mut config = ConciergeConfig::default();
        config.polling.conversation = self.polling.clone();
        config.polling.notifications = self.polling;

        let (inner, temp_dir) = if self.sqlite {
            let temp_dir = tempfile::TempDir::new().map_err(ConciergeError::storage)?;
            config.storage = StorageConfig {
                database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
                ..StorageConfig::default()
            };
            let store = SqliteStore::new(config.storage.clone());
            store.initialize().await?;
            let store: Arc<dyn ConversationStore> = Arc::new(store);
            (store, Some(temp_dir))
        } else {
            let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
            (store, None)
        };

        let store = Arc::new(SwitchableStore::new(inner));
        let delegate = Arc::new(MockDelegate::replying(store.clone(), ""));
        delegate.set_behavior(self.behavior);

        Ok(TestHarness {
            store,
            delegate,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock delegate and a switchable store.
pub struct TestHarness {
    /// The store every component should share.
    pub store: Arc<SwitchableStore>,
    /// Mock assistant; replies are written into `store`.
    pub delegate: Arc<MockDelegate>,
    /// Defaults plus fast polling (and the temp database path with SQLite).
    pub config: ConciergeConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// In-memory harness with a replying delegate.
    pub async fn in_memory() -> TestHarness {
        Self::builder()
            .build()
            .await
            .expect("in-memory harness never fails to build")
    }

    pub fn store_dyn(&self) -> Arc<dyn ConversationStore> {
        self.store.clone()
    }

    pub fn delegate_dyn(&self) -> Arc<dyn DelegateAdapter> {
        self.delegate.clone()
    }
}

/// Waits until `rx` holds a value matching `pred`, panicking after `limit`.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    limit: Duration,
    pred: impl FnMut(&T) -> bool,
) -> T {
    match tokio::time::timeout(limit, rx.wait_for(pred)).await {
        Ok(Ok(value)) => value.clone(),
        Ok(Err(_)) => panic!("watch sender dropped while waiting"),
        Err(_) => panic!("condition not reached within {limit:?}"),
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::{Conversation, ConversationType};

    use super::*;
    use crate::fixtures::guest;

    #[tokio::test]
    async fn in_memory_harness_uses_fast_polling() {
        let harness = TestHarness::in_memory().await;
        assert_eq!(harness.config.polling.conversation, fast_polling());
        assert!(harness.store.list_conversations(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_harnesses_are_isolated() {
        let h1 = TestHarness::builder().with_sqlite().build().await.unwrap();
        let h2 = TestHarness::builder().with_sqlite().build().await.unwrap();
        let conv = Conversation::new(&guest("g-1"), ConversationType::Assisted);
        h1.store.insert_conversation(&conv).await.unwrap();

        assert_eq!(h1.store.list_conversations(None).await.unwrap().len(), 1);
        assert!(h2.store.list_conversations(None).await.unwrap().is_empty());
        assert_ne!(
            h1.config.storage.database_path,
            h2.config.storage.database_path
        );
    }
}
