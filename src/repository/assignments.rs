use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{KeyValueStore, StoreError, StoreRecord, DRIVER_ASSIGNMENT_INDEX};

use super::{driver_partition, order_partition, ASSIGNMENT_SORT_PREFIX};

// ============================================================================
// Driver Assignment Store
// ============================================================================
//
// Records which driver is responsible for which order. Append-only: a
// reassignment writes a new record and the current assignment is the most
// recently created one. Whether an order is in a state that warrants
// delivery is the lifecycle service's decision, not checked here.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverAssignment {
    pub order_id: Uuid,
    pub driver_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

pub struct DriverAssignmentStore {
    store: Arc<dyn KeyValueStore>,
}

impl DriverAssignmentStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn assign(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<DriverAssignment, StoreError> {
        let assignment = DriverAssignment {
            order_id,
            driver_id,
            assigned_at: Utc::now(),
        };

        let body = serde_json::to_value(&assignment)
            .map_err(|e| StoreError::Codec(format!("assignment {order_id}/{driver_id}: {e}")))?;

        self.store
            .put(
                StoreRecord::new(
                    order_partition(order_id),
                    format!("{ASSIGNMENT_SORT_PREFIX}{driver_id}"),
                    body,
                )
                .with_index_key(driver_partition(driver_id)),
            )
            .await?;

        tracing::debug!(
            order_id = %order_id,
            driver_id = %driver_id,
            "Driver assignment recorded"
        );
        Ok(assignment)
    }

    /// All assignments for one driver, newest first, via the secondary
    /// index. Used by the driver-facing collaborator to list work.
    pub async fn for_driver(&self, driver_id: Uuid) -> Result<Vec<DriverAssignment>, StoreError> {
        let records = self
            .store
            .query_by_index(DRIVER_ASSIGNMENT_INDEX, &driver_partition(driver_id), true)
            .await?;

        let mut assignments = records
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;

        // The index sorts by key, not by time; newest-first is defined by
        // assigned_at.
        assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(assignments)
    }

    /// The current assignment for an order: the most recently created
    /// record, or none if the order was never dispatched.
    pub async fn current_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<DriverAssignment>, StoreError> {
        let records = self
            .store
            .query_by_partition(&order_partition(order_id), usize::MAX, false)
            .await?;

        let assignments = records
            .into_iter()
            .filter(|record| record.sort_key.starts_with(ASSIGNMENT_SORT_PREFIX))
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assignments
            .into_iter()
            .max_by_key(|assignment| assignment.assigned_at))
    }

    fn decode(record: StoreRecord) -> Result<DriverAssignment, StoreError> {
        serde_json::from_value(record.body).map_err(|e| {
            StoreError::Codec(format!(
                "assignment {}/{}: {e}",
                record.partition_key, record.sort_key
            ))
        })
    }
}
