//! Balancer HTTP API
//!
//! Accepts send requests from clients, strategy changes from operators and
//! delivery callbacks from providers. Every reply carries the
//! `{"status": <code>, "message": <text>}` envelope.

use crate::application::{CallbackRequest, DispatchService, SendRequest};
use crate::domain::error::DispatchError;
use crate::infrastructure::ShutdownController;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const MSG_FORWARDED: &str = "Data successfully forwarded.";
pub const MSG_INVALID_DESTINATION: &str =
    "The number you have submitted has been marked invalid by our SMS providers.";
pub const MSG_RETRIES_EXCEEDED: &str = "Bad gateway. Failed to forward data. Max retries exceeded.";
pub const MSG_NO_TARGETS: &str = "No SMS providers are available to forward data.";
pub const MSG_INTERNAL: &str = "An error occurred while handling your request.";
pub const MSG_STRATEGY_UPDATED: &str = "Load Balancer strategy successfully updated.";
pub const MSG_CALLBACK_APPLIED: &str = "Callback successfully processed.";
pub const MSG_UNKNOWN_MESSAGE: &str = "No message found for the given message_id.";
pub const MSG_SHUTTING_DOWN: &str = "The service is shutting down.";

/// Strategy change request.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

/// Response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub targets: usize,
    pub strategy: String,
}

fn envelope(code: StatusCode, message: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        code,
        Json(ApiResponse {
            status: code.as_u16(),
            message: message.to_string(),
            message_id: None,
            target: None,
        }),
    )
}

fn error_response(e: &DispatchError) -> (StatusCode, Json<ApiResponse>) {
    match e {
        DispatchError::InvalidDestination => {
            envelope(StatusCode::BAD_REQUEST, MSG_INVALID_DESTINATION)
        }
        DispatchError::RetriesExceeded { .. } => {
            envelope(StatusCode::BAD_GATEWAY, MSG_RETRIES_EXCEEDED)
        }
        DispatchError::NoTargetsAvailable => {
            envelope(StatusCode::SERVICE_UNAVAILABLE, MSG_NO_TARGETS)
        }
        DispatchError::UnknownMessage(_) => envelope(StatusCode::NOT_FOUND, MSG_UNKNOWN_MESSAGE),
        DispatchError::Storage(_) => envelope(StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL),
    }
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<DispatchService>,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(service: Arc<DispatchService>, shutdown: ShutdownController) -> Self {
        Self { service, shutdown }
    }
}

/// HTTP front end of the balancer.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(
        listen_addr: String,
        service: Arc<DispatchService>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            state: ApiState::new(service, shutdown),
        }
    }

    /// Build the router with all routes and request tracing.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run until shutdown is initiated, then stop accepting connections.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("balancer API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
            .await?;
        tracing::info!("balancer API stopped accepting requests");
        Ok(())
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/send", post(send_handler))
        .route("/strategy", get(get_strategy_handler).post(set_strategy_handler))
        .route("/callback", post(callback_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        targets: state.service.registry().list().len(),
        strategy: state.service.strategy().to_string(),
    })
}

async fn send_handler(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> impl IntoResponse {
    let Some(_guard) = state.shutdown.dispatch_guard() else {
        return envelope(StatusCode::SERVICE_UNAVAILABLE, MSG_SHUTTING_DOWN);
    };

    match state.service.send(req).await {
        Ok(delivery) => {
            let (code, Json(mut body)) = envelope(StatusCode::OK, MSG_FORWARDED);
            body.message_id = Some(delivery.message_id);
            body.target = Some(delivery.target_url);
            (code, Json(body))
        }
        Err(e) => {
            tracing::debug!("send failed: {}", e);
            error_response(&e)
        }
    }
}

async fn set_strategy_handler(
    State(state): State<ApiState>,
    req: Result<Json<StrategyRequest>, JsonRejection>,
) -> impl IntoResponse {
    match req {
        Ok(Json(req)) => {
            state.service.update_strategy(&req.strategy);
            envelope(StatusCode::OK, MSG_STRATEGY_UPDATED)
        }
        Err(e) => {
            tracing::error!("malformed strategy request: {}", e);
            envelope(StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
        }
    }
}

async fn get_strategy_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": StatusCode::OK.as_u16(),
        "strategy": state.service.strategy().as_str(),
    }))
}

async fn callback_handler(
    State(state): State<ApiState>,
    Json(req): Json<CallbackRequest>,
) -> impl IntoResponse {
    match state.service.handle_callback(req).await {
        Ok(_) => envelope(StatusCode::OK, MSG_CALLBACK_APPLIED),
        Err(e) => {
            tracing::warn!("callback rejected: {}", e);
            error_response(&e)
        }
    }
}
