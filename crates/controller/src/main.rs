//! Workload Controller - deployment lifecycle service
//!
//! Runs in-cluster (or against the current kubeconfig context) and serves
//! the controller API, health endpoints and metrics.

use anyhow::{Context, Result};
use controller_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    Controller, KubeCluster, MetricsServerSource,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workload_controller::api;
use workload_controller::config::{LogFormat, ServiceConfig};

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;
    init_tracing(config.log_format);

    info!(instance = %config.instance_name, port = config.api_port, "Starting workload-controller");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_API).await;
    health_registry.register(components::METRICS_API).await;

    let cluster = KubeCluster::connect(config.request_timeout())
        .await
        .context("Failed to connect to the Kubernetes API")?;
    let usage = MetricsServerSource::new(cluster.client());
    let default_namespace = cluster.client().default_namespace().to_string();

    let logger = StructuredLogger::new(&config.instance_name);
    let controller = Controller::new(
        Arc::new(cluster),
        Arc::new(usage),
        config.controller_config(),
    )
    .with_health(health_registry.clone())
    .with_logger(logger.clone());

    logger.log_startup(CONTROLLER_VERSION, &default_namespace);

    let app_state = Arc::new(api::AppState::new(controller, health_registry.clone()));
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            let reason = match served {
                Ok(Ok(())) => "API server stopped".to_string(),
                Ok(Err(e)) => format!("API server failed: {:#}", e),
                Err(e) => format!("API server task panicked: {}", e),
            };
            error!(reason = %reason, "API server exited");
            logger.log_shutdown(&reason);
            anyhow::bail!(reason);
        }
    }

    info!("Shutting down");
    Ok(())
}
