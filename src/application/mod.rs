//! Application Layer
//!
//! Use cases that orchestrate the domain services and ports.

mod dispatch_service;
mod target_registry;

pub use dispatch_service::{
    CallbackRequest, Delivery, DispatchConfig, DispatchService, SendRequest, STATUS_FAILED,
    STATUS_INVALID,
};
pub use target_registry::TargetRegistry;
