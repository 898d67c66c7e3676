//! sms-balancer - SMS dispatch load balancer with hexagonal architecture
//!
//! This is the composition root that wires together all the components.

use sms_balancer::adapters::inbound::ApiServer;
use sms_balancer::adapters::outbound::{DashMapLatencyStore, HttpTransport, SqliteStore};
use sms_balancer::application::{DispatchConfig, DispatchService, TargetRegistry};
use sms_balancer::config::load_config;
use sms_balancer::domain::services::StrategySelector;
use sms_balancer::domain::value_objects::LatencyWindow;
use sms_balancer::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting sms-balancer listen={} strategy={} max_retries={}",
        cfg.listen_addr,
        cfg.strategy,
        cfg.max_retries
    );

    // ===== COMPOSITION ROOT =====

    // 1. Storage (SQLite) and target registry
    let store = Arc::new(SqliteStore::open(&cfg.db_path)?);
    if !cfg.servers.is_empty() {
        let inserted = store.seed_targets(cfg.servers.clone()).await?;
        tracing::info!("seeded {} new targets into {}", inserted, cfg.db_path);
    }

    let registry = Arc::new(TargetRegistry::new(store.clone()));
    let count = registry.refresh().await?;
    tracing::info!("loaded {} targets from {}", count, cfg.db_path);
    registry.start_sync(Duration::from_secs(cfg.db_reload_secs.max(1)));

    // 2. Latency store, transport and selector
    let latency = Arc::new(DashMapLatencyStore::with_retention(cfg.latency_retention));
    let transport = Arc::new(HttpTransport::new(Duration::from_millis(
        cfg.transport_timeout_ms,
    ))?);
    let selector = Arc::new(StrategySelector::new(
        cfg.strategy,
        LatencyWindow {
            limit: cfg.latency_limit,
            window: Duration::from_secs(cfg.latency_window_secs),
        },
    ));

    // 3. Application service
    let service = Arc::new(DispatchService::new(
        registry,
        selector,
        latency,
        store,
        transport,
        DispatchConfig {
            max_retries: cfg.max_retries,
            callback_url: cfg.callback_url.clone(),
            headers: Vec::new(),
        },
    ));

    // 4. Inbound adapter with graceful shutdown
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = ApiServer::new(cfg.listen_addr.clone(), service, shutdown.clone());
    server.run().await?;

    if !shutdown
        .wait_for_drain(Duration::from_secs(cfg.drain_timeout_secs))
        .await
    {
        tracing::warn!("exiting with {} dispatches in flight", shutdown.in_flight());
    }
    tracing::info!("sms-balancer stopped");
    Ok(())
}
