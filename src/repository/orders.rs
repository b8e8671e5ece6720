use std::sync::Arc;

use uuid::Uuid;

use crate::domain::order::Order;
use crate::store::{KeyValueStore, StoreError, StoreRecord};

use super::{order_partition, ORDER_SORT_KEY};

// ============================================================================
// Order Repository
// ============================================================================
//
// Reads and writes the canonical order record. An order is self-contained
// under its own key, so a put is a single-partition atomic write.
//
// ============================================================================

pub struct OrderRepository {
    store: Arc<dyn KeyValueStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let record = self
            .store
            .get(&order_partition(order_id), ORDER_SORT_KEY)
            .await?;

        match record {
            Some(record) => {
                let order = serde_json::from_value(record.body)
                    .map_err(|e| StoreError::Codec(format!("order {order_id}: {e}")))?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    pub async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let body = serde_json::to_value(order)
            .map_err(|e| StoreError::Codec(format!("order {}: {e}", order.order_id)))?;

        self.store
            .put(StoreRecord::new(
                order_partition(order.order_id),
                ORDER_SORT_KEY,
                body,
            ))
            .await
    }
}
