//! sms-balancer Library
//!
//! This module exposes the balancer components for use in integration tests
//! and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{DispatchService, TargetRegistry};
pub use config::load_config;
pub use domain::entities::{LatencyRecord, Outcome, SentMessage, Target};
pub use domain::error::{DispatchError, SelectionError, StorageError, TransportError};
pub use domain::ports::{LatencyStore, MessageStore, TargetRepository, Transport};
pub use domain::services::StrategySelector;
pub use domain::value_objects::{LatencyWindow, Strategy};
