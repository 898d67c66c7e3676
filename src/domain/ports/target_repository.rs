//! Target Repository Port
//!
//! Defines the interface for reading the configured upstream targets.
//! Implementations may use SQLite or in-memory storage.

use crate::domain::entities::Target;
use crate::domain::error::StorageError;
use async_trait::async_trait;

/// Repository for accessing target configuration.
///
/// This is an outbound port. The registry reads through it to build
/// its snapshot; it never owns target identity itself.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Get all configured targets in a stable, deterministic order.
    async fn list_targets(&self) -> Result<Vec<Target>, StorageError>;
}
