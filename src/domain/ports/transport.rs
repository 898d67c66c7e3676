//! Transport Port
//!
//! Defines the outbound "send to URL, get status and body" primitive.

use crate::domain::error::TransportError;
use async_trait::async_trait;

/// Raw response from an upstream target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound transport to upstream targets.
///
/// Timeouts are a property of the implementation; a timed out call
/// returns `TransportError::Timeout`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}
