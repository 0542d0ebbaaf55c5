// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the conversation, message, routing log and notification tables.

pub mod conversations;
pub mod messages;
pub mod notifications;
pub mod routing_log;

#[cfg(test)]
pub(crate) mod test_support {
    use concierge_core::{Conversation, ConversationType, GuestIdentity};
    use tempfile::{TempDir, tempdir};

    use crate::database::Database;

    pub async fn open_test_db() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub fn guest(id: &str) -> GuestIdentity {
        GuestIdentity {
            guest_id: id.to_string(),
            name: format!("Guest {id}"),
            email: None,
            room_number: Some("312".to_string()),
        }
    }

    pub async fn seed_conversation(
        db: &Database,
        guest_id: &str,
        conversation_type: ConversationType,
    ) -> Conversation {
        let conv = Conversation::new(&guest(guest_id), conversation_type);
        super::conversations::insert_conversation(db, &conv)
            .await
            .unwrap();
        conv
    }
}
