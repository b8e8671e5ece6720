use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::TransitionError;
use super::value_objects::{LineItem, OrderStatus, StatusChange};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// The canonical representation of an order. `business_id` is immutable
// after creation; `status` only moves forward per the transition table;
// `status_history` is append-only and its last entry always matches the
// current status. All writes go through the lifecycle service.
//
// ============================================================================

/// Input for placing a new order. Validated once, here, rather than by
/// ad-hoc key lookups downstream.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    pub business_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    // Identity
    pub order_id: Uuid,
    pub business_id: Uuid,
    pub order_number: String,

    // Current state
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    pub status: OrderStatus,
    pub business_notes: Option<String>,
    pub estimated_ready_time: Option<DateTime<Utc>>,
    pub preparation_time_minutes: Option<u32>,

    // Audit trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_history: Vec<StatusChange>,

    // Optimistic concurrency token, bumped on every successful transition.
    // The baseline store overwrites blindly; a CAS-capable backend can
    // check this on write to turn a lost update into a retryable conflict.
    pub version: i64,
}

impl Order {
    /// Create a new order in `Pending` with a seeded audit trail.
    pub fn place(business_id: Uuid, draft: OrderDraft) -> Result<Self, TransitionError> {
        Self::validate_items(&draft.items)?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        Ok(Self {
            order_id,
            business_id,
            order_number: Self::generate_order_number(order_id, now),
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            items: draft.items,
            status: OrderStatus::Pending,
            business_notes: draft.business_notes,
            estimated_ready_time: None,
            preparation_time_minutes: None,
            created_at: now,
            updated_at: now,
            status_history: vec![StatusChange {
                status: OrderStatus::Pending,
                timestamp: now,
                note: None,
            }],
            version: 1,
        })
    }

    fn validate_items(items: &[LineItem]) -> Result<(), TransitionError> {
        if items.is_empty() {
            return Err(TransitionError::EmptyItems);
        }
        for item in items {
            if item.quantity <= 0 {
                return Err(TransitionError::InvalidQuantity(item.quantity));
            }
        }
        Ok(())
    }

    /// Human-readable, tenant-scoped order number: date plus a short
    /// suffix derived from the order id.
    fn generate_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
        let bytes = order_id.as_bytes();
        let suffix = u16::from_be_bytes([bytes[0], bytes[1]]) % 10_000;
        format!("{}-{:04}", now.format("%y%m%d"), suffix)
    }

    /// Apply one status transition. Validates first and mutates nothing
    /// on rejection, so a rejected request leaves the aggregate
    /// byte-for-byte unchanged.
    pub fn transition(
        &mut self,
        target: OrderStatus,
        note: Option<String>,
        estimated_ready_time: Option<DateTime<Utc>>,
        preparation_time_minutes: Option<u32>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let now = Utc::now();
        self.status = target;
        self.status_history.push(StatusChange {
            status: target,
            timestamp: now,
            note,
        });
        self.updated_at = now;
        self.version += 1;

        // Preserved as passed on any transition; they only carry domain
        // meaning on Confirmed/Preparing.
        if let Some(ready_time) = estimated_ready_time {
            self.estimated_ready_time = Some(ready_time);
        }
        if let Some(minutes) = preparation_time_minutes {
            self.preparation_time_minutes = Some(minutes);
        }

        Ok(())
    }

    pub fn total_cents(&self) -> i64 {
        self.items.iter().map(|item| item.line_total_cents).sum()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> OrderDraft {
        OrderDraft {
            customer_name: "Ada".to_string(),
            customer_phone: "+34600000001".to_string(),
            items: vec![
                LineItem::new("Margherita", 2, 950),
                LineItem::new("Tiramisu", 1, 550),
            ],
            business_notes: None,
        }
    }

    #[test]
    fn test_place_starts_pending_with_seeded_history() {
        let order = Order::place(Uuid::new_v4(), draft()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(order.total_cents(), 2450);
        assert!(!order.order_number.is_empty());
    }

    #[test]
    fn test_place_rejects_empty_items() {
        let mut empty = draft();
        empty.items.clear();
        assert_eq!(
            Order::place(Uuid::new_v4(), empty).unwrap_err(),
            TransitionError::EmptyItems
        );
    }

    #[test]
    fn test_place_rejects_non_positive_quantity() {
        let mut bad = draft();
        bad.items[0].quantity = 0;
        assert_eq!(
            Order::place(Uuid::new_v4(), bad).unwrap_err(),
            TransitionError::InvalidQuantity(0)
        );
    }

    #[test]
    fn test_transition_appends_history_and_bumps_version() {
        let mut order = Order::place(Uuid::new_v4(), draft()).unwrap();

        order
            .transition(OrderStatus::Confirmed, Some("accepted".to_string()), None, Some(25))
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.status_history.len(), 2);
        assert_eq!(
            order.status_history.last().unwrap().status,
            order.status
        );
        assert_eq!(
            order.status_history.last().unwrap().note.as_deref(),
            Some("accepted")
        );
        assert_eq!(order.preparation_time_minutes, Some(25));
        assert_eq!(order.version, 2);
    }

    #[test]
    fn test_rejected_transition_leaves_order_unchanged() {
        let mut order = Order::place(Uuid::new_v4(), draft()).unwrap();
        order
            .transition(OrderStatus::Confirmed, None, None, None)
            .unwrap();

        let before = order.clone();
        let err = order
            .transition(OrderStatus::Ready, None, None, None)
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Confirmed,
                to: OrderStatus::Ready,
            }
        );
        assert_eq!(order, before);

        // Re-issuing the same rejected request yields the same error and
        // still no change.
        let err_again = order
            .transition(OrderStatus::Ready, None, None, None)
            .unwrap_err();
        assert_eq!(err, err_again);
        assert_eq!(order, before);
    }

    #[test]
    fn test_full_chain_keeps_history_invariant() {
        let mut order = Order::place(Uuid::new_v4(), draft()).unwrap();
        for target in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            order.transition(target, None, None, None).unwrap();
            assert_eq!(order.status_history.last().unwrap().status, order.status);
        }
        assert_eq!(order.status_history.len(), 6);
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let mut order = Order::place(Uuid::new_v4(), draft()).unwrap();
        order
            .transition(OrderStatus::Cancelled, Some("customer called".to_string()), None, None)
            .unwrap();

        let err = order
            .transition(OrderStatus::Confirmed, None, None, None)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed,
            }
        );
    }

    #[test]
    fn test_ready_time_preserved_on_any_transition() {
        let mut order = Order::place(Uuid::new_v4(), draft()).unwrap();
        let ready_at = Utc::now() + chrono::Duration::minutes(30);

        order
            .transition(OrderStatus::Confirmed, None, Some(ready_at), None)
            .unwrap();
        assert_eq!(order.estimated_ready_time, Some(ready_at));

        // Not supplying it again must not clear it.
        order
            .transition(OrderStatus::Preparing, None, None, None)
            .unwrap();
        assert_eq!(order.estimated_ready_time, Some(ready_at));
    }

    #[test]
    fn test_serialization_round_trip() {
        let order = Order::place(Uuid::new_v4(), draft()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order, back);
    }
}
