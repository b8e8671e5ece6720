use uuid::Uuid;

pub mod assignments;
pub mod notifications;
pub mod orders;

pub use assignments::{DriverAssignment, DriverAssignmentStore};
pub use notifications::{Notification, NotificationStore};
pub use orders::OrderRepository;

// ============================================================================
// Key layout of the single wide table
// ============================================================================
//
//   Order             ORDER#<order_id>    / META
//   Notification      <target_partition>  / NOTIF#<notification_id>
//   DriverAssignment  ORDER#<order_id>    / DRIVER#<driver_id>   (indexed)
//
// Orders and their assignments share a partition; the order record is the
// one under the fixed META sort key.
//
// ============================================================================

pub const ORDER_SORT_KEY: &str = "META";
pub const NOTIFICATION_SORT_PREFIX: &str = "NOTIF#";
pub const ASSIGNMENT_SORT_PREFIX: &str = "DRIVER#";

pub fn order_partition(order_id: Uuid) -> String {
    format!("ORDER#{order_id}")
}

pub fn business_partition(business_id: Uuid) -> String {
    format!("BUSINESS#{business_id}")
}

pub fn driver_partition(driver_id: Uuid) -> String {
    format!("DRIVER#{driver_id}")
}
