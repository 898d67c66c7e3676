//! Dispatch Service - Main application use case
//!
//! Orchestrates forwarding: invalid-destination pre-check, strategy
//! driven target selection, the bounded retry loop, latency recording
//! and message persistence. Also applies provider delivery callbacks.

use crate::application::TargetRegistry;
use crate::domain::entities::{LatencyRecord, SentMessage, Target};
use crate::domain::error::{DispatchError, TransportError};
use crate::domain::ports::{LatencyStore, MessageStore, Transport};
use crate::domain::services::StrategySelector;
use crate::domain::value_objects::Strategy;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback status that flags the destination as undeliverable.
pub const STATUS_INVALID: &str = "invalid";
/// Callback status reporting a failed delivery.
pub const STATUS_FAILED: &str = "failed";

/// Inbound send request.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    #[serde(alias = "number")]
    pub destination: String,
    pub message: String,
}

/// Delivery status reported by a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    pub message_id: String,
    pub status: String,
}

/// Successful forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    /// Identifier assigned by the provider
    pub message_id: String,
    /// Target that accepted the message
    pub target_url: String,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
}

/// Dispatch settings fixed at boot.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum outbound attempts per send
    pub max_retries: u32,
    /// Forwarded to providers so they can report delivery status
    pub callback_url: Option<String>,
    /// Extra headers sent with every outbound call
    pub headers: Vec<(String, String)>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            callback_url: None,
            headers: Vec::new(),
        }
    }
}

/// Dispatch service - main application use case.
///
/// Every `send` runs its own retry loop; nothing here serializes
/// concurrent sends. Shared state lives in the selector (atomics), the
/// registry (snapshots) and the latency store (per-target logs).
pub struct DispatchService {
    registry: Arc<TargetRegistry>,
    selector: Arc<StrategySelector>,
    latency: Arc<dyn LatencyStore>,
    messages: Arc<dyn MessageStore>,
    transport: Arc<dyn Transport>,
    config: DispatchConfig,
}

impl DispatchService {
    /// Create a new dispatch service.
    pub fn new(
        registry: Arc<TargetRegistry>,
        selector: Arc<StrategySelector>,
        latency: Arc<dyn LatencyStore>,
        messages: Arc<dyn MessageStore>,
        transport: Arc<dyn Transport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            selector,
            latency,
            messages,
            transport,
            config,
        }
    }

    /// Forward a message to an upstream target.
    ///
    /// Flow:
    /// 1. Reject destinations flagged invalid, before any attempt
    /// 2. Up to `max_retries` attempts, each with a fresh selection
    /// 3. Record latency for every attempt, persist the outcome
    ///
    /// # Returns
    /// The delivery, or `InvalidDestination`, `NoTargetsAvailable`,
    /// `RetriesExceeded` or a storage failure
    pub async fn send(&self, request: SendRequest) -> Result<Delivery, DispatchError> {
        if self
            .messages
            .is_invalid_destination(&request.destination)
            .await?
        {
            tracing::info!("rejected send to invalid destination {}", request.destination);
            return Err(DispatchError::InvalidDestination);
        }

        let body = serde_json::json!({
            "to_number": request.destination,
            "message": request.message,
            "callback_url": self.config.callback_url,
        });

        let mut record = SentMessage::pending(&request.destination, Utc::now());
        let max_retries = self.config.max_retries;
        let mut attempts = 0;

        while attempts < max_retries {
            attempts += 1;

            let targets = self.registry.list();
            let target = match self.selector.select(&targets, self.latency.as_ref()) {
                Ok(target) => target,
                Err(e) => {
                    tracing::error!("dispatch to {} aborted: {}", request.destination, e);
                    record.status = SentMessage::STATUS_FAILED_TO_SEND.to_string();
                    self.messages.save_message(&record).await?;
                    return Err(e.into());
                }
            };

            let started_at = Utc::now();
            match self.attempt(&target, &body).await {
                Ok(message_id) => {
                    self.latency
                        .record(LatencyRecord::success(&target.url, started_at, Utc::now()));

                    record.provider_id = Some(message_id.clone());
                    record.target_url = Some(target.url.clone());
                    self.messages.save_message(&record).await?;

                    tracing::info!(
                        "forwarded message {} to {} (attempt {}/{})",
                        message_id,
                        target.url,
                        attempts,
                        max_retries
                    );
                    return Ok(Delivery {
                        message_id,
                        target_url: target.url,
                        attempts,
                    });
                }
                Err(e) => {
                    self.latency.record(LatencyRecord::failed(&target.url, started_at));
                    tracing::warn!(
                        "attempt {}/{} to {} failed: {}",
                        attempts,
                        max_retries,
                        target.url,
                        e
                    );
                }
            }
        }

        record.status = SentMessage::STATUS_FAILED_TO_SEND.to_string();
        self.messages.save_message(&record).await?;
        tracing::error!(
            "max retries exceeded forwarding to {} after {} attempts",
            request.destination,
            attempts
        );
        Err(DispatchError::RetriesExceeded { attempts })
    }

    /// One outbound call. Returns the provider-assigned message id.
    async fn attempt(
        &self,
        target: &Target,
        body: &serde_json::Value,
    ) -> Result<String, TransportError> {
        let response = self
            .transport
            .post_json(&target.url, &self.config.headers, body)
            .await?;

        if !response.is_success() {
            return Err(TransportError::Status(response.status));
        }

        let parsed: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        match &parsed["message_id"] {
            serde_json::Value::String(id) => Ok(id.clone()),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            _ => Err(TransportError::MalformedResponse(
                "missing message_id".to_string(),
            )),
        }
    }

    /// Apply a provider delivery callback to its message.
    ///
    /// Sets completion time and status, flags the destination when the
    /// status is `invalid`, and records the end-to-end delivery time as a
    /// latency sample for the target that accepted the message.
    ///
    /// The sample starts at the message's `start_time`, taken before the
    /// retry loop. Time spent on failed attempts against other targets is
    /// therefore charged to the accepting target, and the sample shares that
    /// target's average with its transport round-trip samples.
    pub async fn handle_callback(
        &self,
        callback: CallbackRequest,
    ) -> Result<SentMessage, DispatchError> {
        let mut message = self
            .messages
            .find_by_provider_id(&callback.message_id)
            .await?
            .ok_or_else(|| DispatchError::UnknownMessage(callback.message_id.clone()))?;

        let end_time = Utc::now();

        if callback.status == STATUS_INVALID {
            self.messages
                .mark_destination_invalid(&message.destination)
                .await?;
            tracing::info!("destination {} marked invalid", message.destination);
        }

        message.end_time = Some(end_time);
        message.status = callback.status;
        self.messages.save_message(&message).await?;

        if let Some(url) = &message.target_url {
            let record = if message.status == STATUS_INVALID || message.status == STATUS_FAILED {
                LatencyRecord::failed(url, message.start_time)
            } else {
                LatencyRecord::success(url, message.start_time, end_time)
            };
            self.latency.record(record);
        }

        tracing::debug!(
            "callback applied to message {} status={}",
            callback.message_id,
            message.status
        );
        Ok(message)
    }

    /// Switch the load balancing strategy. Unknown names are ignored.
    pub fn update_strategy(&self, name: &str) -> bool {
        self.selector.set_strategy(name)
    }

    /// Get the active load balancing strategy.
    pub fn strategy(&self) -> Strategy {
        self.selector.strategy()
    }

    /// Get the target registry.
    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }
}
