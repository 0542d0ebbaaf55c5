// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, trace};

use concierge_config::model::StorageConfig;
use concierge_core::{
    AdapterType, ChangeEvent, ChangeFilter, ConciergeError, Conversation, ConversationStatus,
    ConversationStore, ConversationType, HandlerTransition, HealthStatus, Message, Notification,
    PluginAdapter, RoutingLogEntry, Subscription,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`ConversationStore::initialize`].
///
/// Every successful write is published on an in-process broadcast channel
/// after it commits; that channel is the push half of the engine's feeds.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: ConversationStore::initialize
    pub fn new(config: StorageConfig) -> Self {
        let (changes, _) = broadcast::channel(config.push_capacity.max(1));
        Self {
            config,
            db: OnceCell::new(),
            changes,
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ConciergeError> {
        self.db.get().ok_or_else(|| ConciergeError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is not an error; polling covers late joiners.
        if self.changes.send(event).is_err() {
            trace!("change published with no subscribers");
        }
    }

    async fn checkpoint(db: &Database) -> Result<(), ConciergeError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn initialize(&self) -> Result<(), ConciergeError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ConciergeError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ConciergeError> {
        let db = self.db()?;
        Self::checkpoint(db).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Conversations ---

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), ConciergeError> {
        queries::conversations::insert_conversation(self.db()?, conversation).await?;
        self.publish(ChangeEvent::ConversationInserted(conversation.clone()));
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ConciergeError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn find_active_conversation(
        &self,
        guest_id: &str,
        conversation_type: ConversationType,
    ) -> Result<Option<Conversation>, ConciergeError> {
        queries::conversations::find_active_conversation(self.db()?, guest_id, conversation_type)
            .await
    }

    async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ConciergeError> {
        queries::conversations::list_conversations(self.db()?, status).await
    }

    async fn apply_transition(
        &self,
        transition: &HandlerTransition,
    ) -> Result<Option<Conversation>, ConciergeError> {
        let updated = queries::conversations::apply_transition(self.db()?, transition).await?;
        if let Some(conv) = &updated {
            self.publish(ChangeEvent::ConversationUpdated(conv.clone()));
        }
        Ok(updated)
    }

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), ConciergeError> {
        queries::messages::insert_message(self.db()?, message).await?;
        self.publish(ChangeEvent::MessageInserted(message.clone()));
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ConciergeError> {
        queries::messages::get_messages(self.db()?, conversation_id).await
    }

    async fn messages_since(
        &self,
        conversation_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, ConciergeError> {
        queries::messages::get_messages_since(self.db()?, conversation_id, since).await
    }

    // --- Routing log ---

    async fn append_routing_log(&self, entry: &RoutingLogEntry) -> Result<(), ConciergeError> {
        queries::routing_log::append_entry(self.db()?, entry).await
    }

    async fn routing_log(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<RoutingLogEntry>, ConciergeError> {
        queries::routing_log::entries_for_conversation(self.db()?, conversation_id).await
    }

    // --- Notifications ---

    async fn insert_notification(&self, notification: &Notification) -> Result<(), ConciergeError> {
        queries::notifications::insert_notification(self.db()?, notification).await?;
        self.publish(ChangeEvent::NotificationInserted(notification.clone()));
        Ok(())
    }

    async fn notifications_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, ConciergeError> {
        queries::notifications::notifications_since(self.db()?, user_id, since).await
    }

    // --- Push feed ---

    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription::new(self.changes.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{GuestIdentity, Handler, NotificationKind, SenderType};
    use tempfile::{TempDir, tempdir};

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            push_capacity: 16,
        }
    }

    async fn open_store() -> (SqliteStore, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();
        (store, dir)
    }

    fn guest() -> GuestIdentity {
        GuestIdentity {
            guest_id: "guest-1".into(),
            name: "Lin".into(),
            email: Some("lin@example.com".into()),
            room_number: Some("508".into()),
        }
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let (store, _dir) = open_store().await;
        assert!(store.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        assert!(store.health_check().await.is_err());

        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn committed_writes_are_published_to_matching_subscribers() {
        let (store, _dir) = open_store().await;
        let conv = Conversation::new(&guest(), ConversationType::Assisted);

        let mut conv_sub = store.subscribe(ChangeFilter::Conversation {
            id: conv.id.clone(),
        });
        let mut msg_sub = store.subscribe(ChangeFilter::Messages {
            conversation_id: conv.id.clone(),
        });

        store.insert_conversation(&conv).await.unwrap();
        let msg = Message::text(&conv.id, SenderType::Guest, Some("guest-1".into()), "Lin", "hi");
        store.insert_message(&msg).await.unwrap();

        assert_eq!(
            conv_sub.recv().await,
            Some(ChangeEvent::ConversationInserted(conv.clone()))
        );
        assert_eq!(msg_sub.recv().await, Some(ChangeEvent::MessageInserted(msg)));

        let updated = store
            .apply_transition(&HandlerTransition {
                conversation_id: conv.id.clone(),
                expected: conv.handler_state(),
                current_handler: Handler::Human,
                status: ConversationStatus::Escalated,
                assigned_staff_id: None,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            conv_sub.recv().await,
            Some(ChangeEvent::ConversationUpdated(updated))
        );
    }

    #[tokio::test]
    async fn failed_writes_publish_nothing() {
        let (store, _dir) = open_store().await;
        let conv = Conversation::new(&guest(), ConversationType::Assisted);
        store.insert_conversation(&conv).await.unwrap();

        let mut sub = store.subscribe(ChangeFilter::Conversation {
            id: conv.id.clone(),
        });
        let stale = HandlerTransition {
            conversation_id: conv.id.clone(),
            expected: concierge_core::HandlerState {
                version: 41,
                ..conv.handler_state()
            },
            current_handler: Handler::Human,
            status: ConversationStatus::Escalated,
            assigned_staff_id: None,
        };
        assert!(store.apply_transition(&stale).await.unwrap().is_none());

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await;
        assert!(nothing.is_err(), "no event expected for a rejected transition");
    }

    #[tokio::test]
    async fn notifications_round_trip_through_store() {
        let (store, _dir) = open_store().await;
        let mut sub = store.subscribe(ChangeFilter::Notifications {
            user_id: "guest-1".into(),
        });
        let n = Notification::new(
            "guest-1",
            NotificationKind::BookingStatus,
            "Spa booking confirmed",
            "See you at 4pm",
            Some("booking-9".into()),
        );
        store.insert_notification(&n).await.unwrap();

        assert_eq!(sub.recv().await, Some(ChangeEvent::NotificationInserted(n.clone())));
        assert_eq!(store.notifications_since("guest-1", None).await.unwrap(), vec![n]);
    }

    #[tokio::test]
    async fn shutdown_runs_checkpoint() {
        let (store, _dir) = open_store().await;
        let conv = Conversation::new(&guest(), ConversationType::Concierge);
        store.insert_conversation(&conv).await.unwrap();
        store.shutdown().await.unwrap();
        store.close().await.unwrap();
    }
}
