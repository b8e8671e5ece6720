pub mod aggregate;
pub mod errors;
pub mod value_objects;

pub use aggregate::{Order, OrderDraft};
pub use errors::TransitionError;
pub use value_objects::{LineItem, OrderStatus, StatusChange};
