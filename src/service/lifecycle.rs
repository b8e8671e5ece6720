use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{Order, OrderDraft, OrderStatus, TransitionError};
use crate::repository::{
    business_partition, driver_partition, DriverAssignmentStore, NotificationStore,
    OrderRepository,
};
use crate::store::{KeyValueStore, StoreError};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Order Lifecycle Service
// ============================================================================
//
// The single entry point for order state changes. Orchestrates: load,
// tenant check, state-machine transition, persist, notification fan-out,
// driver dispatch. The order write is authoritative and irrevocable once
// persisted; notification and assignment writes are side effects that are
// retried, then either logged (best effort) or surfaced as PartialSuccess
// (strict) — they never roll the status back.
//
// ============================================================================

/// Which side effect of a status change failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// The business notification describing the transition.
    Notification,
    /// The assignment record for the chosen driver.
    DriverAssignment,
    /// The notification telling the driver about the delivery.
    DriverNotification,
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideEffect::Notification => f.write_str("notification"),
            SideEffect::DriverAssignment => f.write_str("driver assignment"),
            SideEffect::DriverNotification => f.write_str("driver notification"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("order {order_id} does not belong to business {business_id}")]
    NotAuthorized { order_id: Uuid, business_id: Uuid },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Strict mode only: the status mutation is persisted but the named
    /// side effects are not. Every due side effect is attempted before
    /// this is raised, so the list is exactly what the caller has to
    /// re-drive.
    #[error("order {order_id} moved to {status} but side effects failed: {failed:?}")]
    PartialSuccess {
        order_id: Uuid,
        status: OrderStatus,
        failed: Vec<SideEffect>,
    },
}

impl LifecycleError {
    /// Whether the external boundary should report this as "not found".
    /// NotAuthorized is deliberately included so callers cannot probe for
    /// the existence of other tenants' orders; the core still logs the
    /// two cases distinctly.
    pub fn conceals_as_not_found(&self) -> bool {
        matches!(
            self,
            LifecycleError::OrderNotFound(_) | LifecycleError::NotAuthorized { .. }
        )
    }
}

/// Caller's input to `update_order_status`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub new_status: OrderStatus,
    pub note: Option<String>,
    pub estimated_ready_time: Option<DateTime<Utc>>,
    pub preparation_time_minutes: Option<u32>,
    /// Driver chosen by the business for dispatch. Only consulted when
    /// the transition enters OutForDelivery.
    pub driver_id: Option<Uuid>,
}

impl StatusUpdate {
    /// A bare transition request to `new_status`.
    pub fn to(new_status: OrderStatus) -> Self {
        Self {
            new_status,
            note: None,
            estimated_ready_time: None,
            preparation_time_minutes: None,
            driver_id: None,
        }
    }
}

/// How side-effect failures after the authoritative write are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectMode {
    /// Log and swallow; the caller sees the status change succeed.
    BestEffort,
    /// Surface PartialSuccess so the caller can re-drive the side effect.
    Strict,
}

pub struct OrderLifecycleService {
    orders: OrderRepository,
    notifications: NotificationStore,
    assignments: DriverAssignmentStore,
    mode: SideEffectMode,
    retry: RetryConfig,
}

impl OrderLifecycleService {
    pub fn new(store: Arc<dyn KeyValueStore>, mode: SideEffectMode) -> Self {
        Self {
            orders: OrderRepository::new(store.clone()),
            notifications: NotificationStore::new(store.clone()),
            assignments: DriverAssignmentStore::new(store),
            mode,
            retry: RetryConfig::conservative(),
        }
    }

    /// Override the side-effect retry policy (tests use a fast one).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create a new order for the business and notify it. The order
    /// starts in Pending with its audit trail seeded.
    pub async fn place_order(
        &self,
        business_id: Uuid,
        draft: OrderDraft,
    ) -> Result<Order, LifecycleError> {
        let order = Order::place(business_id, draft)?;
        self.orders.put(&order).await?;

        tracing::info!(
            order_id = %order.order_id,
            business_id = %business_id,
            order_number = %order.order_number,
            "Order placed"
        );

        let mut failed = Vec::new();
        let message = format!("New order {} received", order.order_number);
        if let Err(error) = self.emit_business_notification(&order, message).await {
            self.note_failure(&order, SideEffect::Notification, &error, &mut failed);
        }
        self.settle_side_effects(&order, failed)?;

        Ok(order)
    }

    /// Tenant-checked read used by the serving collaborator.
    pub async fn get_order(
        &self,
        business_id: Uuid,
        order_id: Uuid,
    ) -> Result<Order, LifecycleError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound(order_id))?;
        self.check_tenant(&order, business_id)?;
        Ok(order)
    }

    /// Advance an order through the status state machine. Validation
    /// happens before any write; a rejected transition leaves no trace.
    pub async fn update_order_status(
        &self,
        business_id: Uuid,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<Order, LifecycleError> {
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound(order_id))?;
        self.check_tenant(&order, business_id)?;

        let previous = order.status;
        order.transition(
            update.new_status,
            update.note.clone(),
            update.estimated_ready_time,
            update.preparation_time_minutes,
        )?;

        // Single-partition atomic write; on failure the stored order is
        // still in its prior state.
        self.orders.put(&order).await?;

        tracing::info!(
            order_id = %order.order_id,
            business_id = %business_id,
            from = %previous,
            to = %order.status,
            version = order.version,
            "Order status updated"
        );

        // Every due side effect is attempted, whatever happened to the
        // ones before it; failures are collected and settled once at the
        // end so strict mode reports exactly the missing work.
        let mut failed = Vec::new();

        let message = format!("Order {} is now {}", order.order_number, order.status);
        if let Err(error) = self.emit_business_notification(&order, message).await {
            self.note_failure(&order, SideEffect::Notification, &error, &mut failed);
        }

        if order.status == OrderStatus::OutForDelivery {
            if let Some(driver_id) = update.driver_id {
                self.dispatch_driver(&order, driver_id, &mut failed).await;
            } else {
                tracing::debug!(
                    order_id = %order.order_id,
                    "Out for delivery without a driver choice, dispatch skipped"
                );
            }
        }

        self.settle_side_effects(&order, failed)?;

        Ok(order)
    }

    fn check_tenant(&self, order: &Order, business_id: Uuid) -> Result<(), LifecycleError> {
        if order.business_id != business_id {
            // Logged distinctly from OrderNotFound; the external boundary
            // maps both to the same response.
            tracing::warn!(
                order_id = %order.order_id,
                owner = %order.business_id,
                caller = %business_id,
                "Tenant mismatch on order access"
            );
            return Err(LifecycleError::NotAuthorized {
                order_id: order.order_id,
                business_id,
            });
        }
        Ok(())
    }

    /// Notify the owning business about a lifecycle event, with bounded
    /// retry on transient store errors.
    async fn emit_business_notification(
        &self,
        order: &Order,
        message: String,
    ) -> Result<(), StoreError> {
        let target = business_partition(order.business_id);
        let metadata = Self::order_metadata(order);

        flatten_retry(
            retry_on_transient(self.retry.clone(), |_attempt| {
                self.notifications.create(&target, message.clone(), metadata.clone())
            })
            .await,
        )
    }

    /// Append the assignment record, then tell the driver. The two
    /// writes are tracked as separate side effects: a persisted
    /// assignment whose driver notification failed must not be re-driven
    /// as a whole, only the notification is missing. The driver
    /// notification is skipped when the assignment itself failed;
    /// re-driving the assignment covers it.
    async fn dispatch_driver(&self, order: &Order, driver_id: Uuid, failed: &mut Vec<SideEffect>) {
        let assigned = flatten_retry(
            retry_on_transient(self.retry.clone(), |_attempt| {
                self.assignments.assign(order.order_id, driver_id)
            })
            .await,
        );
        if let Err(error) = assigned {
            self.note_failure(order, SideEffect::DriverAssignment, &error, failed);
            return;
        }

        let target = driver_partition(driver_id);
        let message = format!("New delivery: order {}", order.order_number);
        let metadata = Self::order_metadata(order);

        let notified = flatten_retry(
            retry_on_transient(self.retry.clone(), |_attempt| {
                self.notifications.create(&target, message.clone(), metadata.clone())
            })
            .await,
        );
        if let Err(error) = notified {
            self.note_failure(order, SideEffect::DriverNotification, &error, failed);
        }
    }

    fn note_failure(
        &self,
        order: &Order,
        side_effect: SideEffect,
        error: &StoreError,
        failed: &mut Vec<SideEffect>,
    ) {
        tracing::warn!(
            order_id = %order.order_id,
            status = %order.status,
            side_effect = %side_effect,
            error = %error,
            "Side effect failed, status change kept"
        );
        failed.push(side_effect);
    }

    /// Fold the collected side-effect failures into the configured
    /// reporting mode. The status change stays persisted either way.
    fn settle_side_effects(
        &self,
        order: &Order,
        failed: Vec<SideEffect>,
    ) -> Result<(), LifecycleError> {
        if failed.is_empty() {
            return Ok(());
        }
        match self.mode {
            SideEffectMode::Strict => Err(LifecycleError::PartialSuccess {
                order_id: order.order_id,
                status: order.status,
                failed,
            }),
            SideEffectMode::BestEffort => Ok(()),
        }
    }

    fn order_metadata(order: &Order) -> HashMap<String, String> {
        HashMap::from([
            ("order_id".to_string(), order.order_id.to_string()),
            ("order_number".to_string(), order.order_number.clone()),
            ("status".to_string(), order.status.to_string()),
            ("timestamp".to_string(), order.updated_at.to_rfc3339()),
        ])
    }
}

/// The error left after a retried operation, if any.
fn flatten_retry<T>(result: RetryResult<T, StoreError>) -> Result<(), StoreError> {
    match result {
        RetryResult::Success(_) => Ok(()),
        RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => Err(e),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
