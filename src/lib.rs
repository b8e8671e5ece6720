// ============================================================================
// order_dispatch - multi-tenant order lifecycle & notification fan-out
// ============================================================================
//
// Advances orders through their status chain, persists each transition as
// a single-key write in a wide key-value table, and fans notifications
// (and driver assignments) out to the interested parties. Authentication
// and transport wiring live in the calling layer; this crate trusts the
// business id it is handed.
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod repository;
pub mod service;
pub mod store;
pub mod utils;

pub use config::Config;
pub use domain::order::{LineItem, Order, OrderDraft, OrderStatus, StatusChange, TransitionError};
pub use repository::{DriverAssignment, DriverAssignmentStore, Notification, NotificationStore};
pub use service::{LifecycleError, OrderLifecycleService, SideEffect, SideEffectMode, StatusUpdate};
pub use store::{InMemoryStore, KeyValueStore, ScyllaStore, StoreError, StoreRecord};
