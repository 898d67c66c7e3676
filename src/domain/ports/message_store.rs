//! Message Store Port
//!
//! Defines the interface for persisting forwarded messages and
//! destinations flagged invalid by provider feedback.

use crate::domain::entities::SentMessage;
use crate::domain::error::StorageError;
use async_trait::async_trait;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Whether the destination was previously flagged as undeliverable.
    async fn is_invalid_destination(&self, destination: &str) -> Result<bool, StorageError>;

    /// Flag a destination as undeliverable. Flagging twice is a no-op.
    async fn mark_destination_invalid(&self, destination: &str) -> Result<(), StorageError>;

    /// Insert or replace a message record, keyed by its local id.
    async fn save_message(&self, message: &SentMessage) -> Result<(), StorageError>;

    /// Find a message by the identifier the provider assigned to it.
    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<SentMessage>, StorageError>;
}
