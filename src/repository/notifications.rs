use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{KeyValueStore, StoreError, StoreRecord};

use super::NOTIFICATION_SORT_PREFIX;

// ============================================================================
// Notification Store
// ============================================================================
//
// Appends notification records under a target's partition and lists them
// newest first. Notification ids are UUIDv7, so the NOTIF#<id> sort key
// sorts chronologically and a descending partition query is already
// reverse-chronological.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub notification_id: Uuid,
    pub message: String,
    /// Opaque key/value mapping, schema owned by the caller.
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

pub struct NotificationStore {
    store: Arc<dyn KeyValueStore>,
}

impl NotificationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn sort_key(notification_id: Uuid) -> String {
        format!("{NOTIFICATION_SORT_PREFIX}{notification_id}")
    }

    pub async fn create(
        &self,
        target_partition: &str,
        message: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Result<Notification, StoreError> {
        let notification = Notification {
            notification_id: Uuid::now_v7(),
            message: message.into(),
            metadata,
            created_at: Utc::now(),
            read: false,
        };

        self.write(target_partition, &notification).await?;

        tracing::debug!(
            target_partition = %target_partition,
            notification_id = %notification.notification_id,
            "Notification created"
        );
        Ok(notification)
    }

    /// Up to `limit` notifications for the target, newest first.
    /// Restartable; no cursor state is held server-side.
    pub async fn list(
        &self,
        target_partition: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let records = self
            .store
            .query_by_partition(target_partition, limit, true)
            .await?;

        records
            .into_iter()
            .filter(|record| record.sort_key.starts_with(NOTIFICATION_SORT_PREFIX))
            .map(|record| {
                serde_json::from_value(record.body).map_err(|e| {
                    StoreError::Codec(format!(
                        "notification {}/{}: {e}",
                        target_partition, record.sort_key
                    ))
                })
            })
            .collect()
    }

    /// Flip the read flag false→true. Idempotent; returns false when the
    /// notification does not exist.
    pub async fn mark_read(
        &self,
        target_partition: &str,
        notification_id: Uuid,
    ) -> Result<bool, StoreError> {
        let record = self
            .store
            .get(target_partition, &Self::sort_key(notification_id))
            .await?;

        let Some(record) = record else {
            return Ok(false);
        };

        let mut notification: Notification = serde_json::from_value(record.body)
            .map_err(|e| StoreError::Codec(format!("notification {notification_id}: {e}")))?;

        if !notification.read {
            notification.read = true;
            self.write(target_partition, &notification).await?;
        }
        Ok(true)
    }

    async fn write(
        &self,
        target_partition: &str,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_value(notification).map_err(|e| {
            StoreError::Codec(format!("notification {}: {e}", notification.notification_id))
        })?;

        self.store
            .put(StoreRecord::new(
                target_partition,
                Self::sort_key(notification.notification_id),
                body,
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn store() -> NotificationStore {
        NotificationStore::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_starts_unread() {
        let notifications = store();
        let created = notifications
            .create("BUSINESS#b1", "New order 240101-0001", HashMap::new())
            .await
            .unwrap();

        assert!(!created.read);
        assert!(!created.message.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_reverse_chronological() {
        let notifications = store();
        for n in 0..5 {
            notifications
                .create("BUSINESS#b1", format!("event {n}"), HashMap::new())
                .await
                .unwrap();
            // Keep creations in distinct milliseconds so the v7 sort key
            // order is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = notifications.list("BUSINESS#b1", 10).await.unwrap();
        assert_eq!(listed.len(), 5);
        for pair in listed.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        assert_eq!(listed[0].message, "event 4");
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let notifications = store();
        for n in 0..4 {
            notifications
                .create("BUSINESS#b1", format!("event {n}"), HashMap::new())
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = notifications.list("BUSINESS#b1", 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].message, "event 3");
        assert_eq!(listed[1].message, "event 2");
    }

    #[tokio::test]
    async fn test_targets_are_isolated() {
        let notifications = store();
        notifications
            .create("BUSINESS#b1", "for b1", HashMap::new())
            .await
            .unwrap();
        notifications
            .create("DRIVER#d1", "for d1", HashMap::new())
            .await
            .unwrap();

        let b1 = notifications.list("BUSINESS#b1", 10).await.unwrap();
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].message, "for b1");
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let notifications = store();
        let created = notifications
            .create("BUSINESS#b1", "read me", HashMap::new())
            .await
            .unwrap();

        assert!(notifications
            .mark_read("BUSINESS#b1", created.notification_id)
            .await
            .unwrap());
        assert!(notifications
            .mark_read("BUSINESS#b1", created.notification_id)
            .await
            .unwrap());

        let listed = notifications.list("BUSINESS#b1", 10).await.unwrap();
        assert!(listed[0].read);
    }

    #[tokio::test]
    async fn test_mark_read_absent_notification() {
        let notifications = store();
        assert!(!notifications
            .mark_read("BUSINESS#b1", Uuid::now_v7())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_metadata_round_trips() {
        let notifications = store();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "O1".to_string());
        metadata.insert("status".to_string(), "CONFIRMED".to_string());

        notifications
            .create("BUSINESS#b1", "status change", metadata.clone())
            .await
            .unwrap();

        let listed = notifications.list("BUSINESS#b1", 1).await.unwrap();
        assert_eq!(listed[0].metadata, metadata);
    }
}
