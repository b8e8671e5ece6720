pub mod lifecycle;

pub use lifecycle::{
    LifecycleError, OrderLifecycleService, SideEffect, SideEffectMode, StatusUpdate,
};
