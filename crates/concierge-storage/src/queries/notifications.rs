// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order and booking status notifications.

use chrono::{DateTime, Utc};
use concierge_core::{ConciergeError, Notification};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{NOTIFICATION_COLUMNS, format_timestamp, notification_from_row};

pub async fn insert_notification(db: &Database, n: &Notification) -> Result<(), ConciergeError> {
    let n = n.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, title, body, reference_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    n.id,
                    n.user_id,
                    n.kind.to_string(),
                    n.title,
                    n.body,
                    n.reference_id,
                    format_timestamp(&n.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Notifications for `user_id` at or after `since`; all of them when `since` is `None`.
pub async fn notifications_since(
    db: &Database,
    user_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Notification>, ConciergeError> {
    let user_id = user_id.to_string();
    let since = since.map(|ts| format_timestamp(&ts));
    db.connection()
        .call(move |conn| -> Result<Vec<Notification>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 AND (?2 IS NULL OR created_at >= ?2)
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![user_id, since], notification_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::open_test_db;
    use chrono::TimeZone;
    use concierge_core::NotificationKind;

    fn at(user: &str, title: &str, minute: u32) -> Notification {
        let mut n = Notification::new(
            user,
            NotificationKind::OrderStatus,
            title,
            "Your order is on its way",
            Some("order-1".into()),
        );
        n.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap();
        n
    }

    #[tokio::test]
    async fn without_cursor_returns_everything_for_user() {
        let (db, _dir) = open_test_db().await;
        insert_notification(&db, &at("u1", "placed", 1)).await.unwrap();
        insert_notification(&db, &at("u1", "shipped", 2)).await.unwrap();
        insert_notification(&db, &at("u2", "other", 3)).await.unwrap();

        let all = notifications_since(&db, "u1", None).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["placed", "shipped"]);
    }

    #[tokio::test]
    async fn cursor_is_inclusive() {
        let (db, _dir) = open_test_db().await;
        let first = at("u1", "placed", 1);
        let second = at("u1", "shipped", 2);
        insert_notification(&db, &first).await.unwrap();
        insert_notification(&db, &second).await.unwrap();

        let since = notifications_since(&db, "u1", Some(second.created_at))
            .await
            .unwrap();
        assert_eq!(since, vec![second]);
    }
}
