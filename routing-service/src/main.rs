//! Routing service entry point.

use routing_service::config::RoutingConfig;
use routing_service::startup::{Application, SERVICE_NAME};
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = RoutingConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        SERVICE_NAME,
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );
    init_metrics();

    if config.maps.api_key.is_none() {
        tracing::error!("GOOGLE_MAPS_API_KEY is not set. Geocoding and routing calls will fail.");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        project = %config.warehouse.project_id,
        dataset = %config.warehouse.dataset,
        port = config.common.port,
        "Starting routing-service"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    app.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
