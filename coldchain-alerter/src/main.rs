//! Cold chain alerter entry point.

use coldchain_alerter::startup::{Application, SERVICE_NAME};
use service_core::config::Config;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(SERVICE_NAME, &config.log_level, config.otlp_endpoint.as_deref());
    init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        "Starting coldchain-alerter"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    app.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
