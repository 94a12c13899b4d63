//! Wires every component together, owns the tokio runtime's lifetime, and
//! runs the shutdown sequence on SIGINT/SIGTERM.

use crate::chain::RpcChainClient;
use crate::clock::{Clock, SystemClock};
use crate::db::{PgStore, Store};
use crate::errors::{BotError, Result};
use crate::monitor::Monitor;
use crate::monitoring::{HealthCheck, Metrics};
use crate::pnl::PnlAggregator;
use crate::push::{self, PushHub};
use crate::token_meta::TokenMeta;
use crate::utils::Config;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EVENT_BUS_CAPACITY: usize = 4096;

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    config.validate()?;
    init_tracing(&config)?;

    info!("starting solana wallet pnl tracker");

    let pg_store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    pg_store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(pg_store);

    let chain = Arc::new(RpcChainClient::new(config.solana_rpc_url.clone(), config.max_concurrent_rpc_requests));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let token_meta = Arc::new(TokenMeta::new(store.clone(), chain.clone()));
    token_meta.preload().await?;
    let metrics = Arc::new(Metrics::new().map_err(|e| BotError::internal(format!("failed to init metrics: {e}")))?);

    let (events_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
    let pnl = Arc::new(PnlAggregator::new(store.clone(), clock.clone(), events_tx.clone()));
    let monitor = Arc::new(Monitor::new(chain, store.clone(), pnl, clock.clone(), events_tx));
    monitor.initialize().await?;

    let push_hub = PushHub::new(store.clone(), token_meta, clock, metrics.clone());
    let health = Arc::new(HealthCheck::new(store, monitor.clone()));

    let monitor_handle = tokio::spawn(monitor.clone().start());

    let hub_for_events = push_hub.clone();
    let hub_events_handle = tokio::spawn(hub_for_events.run_event_loop(monitor.subscribe()));

    let http_addr = format!("0.0.0.0:{}", config.port)
        .parse()
        .map_err(|e| BotError::config(format!("invalid PORT: {e}")))?;
    let ws_addr = format!("0.0.0.0:{}", config.ws_port)
        .parse()
        .map_err(|e| BotError::config(format!("invalid WS_PORT: {e}")))?;

    let http_handle = tokio::spawn(push::serve_http(http_addr, health, metrics));
    let ws_handle = tokio::spawn(push::serve_ws(ws_addr, push_hub));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping monitor");
    monitor.stop();

    monitor_handle.abort();
    hub_events_handle.abort();
    http_handle.abort();
    ws_handle.abort();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&config.rust_log)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json();
    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    match &config.otel_exporter_otlp_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
                .install_batch(opentelemetry_sdk::runtime::Tokio)
                .map_err(|e| BotError::internal(format!("failed to init otlp pipeline: {e}")))?;
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            registry
                .with(otel_layer)
                .try_init()
                .map_err(|e| BotError::internal(format!("failed to install tracing subscriber: {e}")))
        }
        None => registry
            .try_init()
            .map_err(|e| BotError::internal(format!("failed to install tracing subscriber: {e}"))),
    }
    .map_err(|e| {
        error!(error = %e, "tracing init failed");
        e
    })
}
