//! Application startup and lifecycle management.

use axum::Router;
use service_core::config::Config;
use service_core::error::AppError;
use service_core::server::{HealthState, finish_router, health_router, post_only, serve};
use service_core::warehouse::{BigQueryClient, SharedWarehouse};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::RoutingConfig;
use crate::handlers::plan_delivery_route;
use crate::services::MapsClient;

pub const SERVICE_NAME: &str = "routing-service";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub warehouse: SharedWarehouse,
    pub maps: Arc<MapsClient>,
}

pub fn router(state: AppState) -> Router {
    let health = health_router(HealthState {
        service: SERVICE_NAME,
        banner: None,
        warehouse: Some(state.warehouse.clone()),
    });

    let api = Router::new()
        .route("/route/delivery", post_only(plan_delivery_route))
        .with_state(state);

    finish_router(api.merge(health))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect to BigQuery, verify the connection and bind the listener.
    pub async fn build(config: RoutingConfig) -> Result<Self, AppError> {
        let warehouse: SharedWarehouse = Arc::new(BigQueryClient::new(&config.warehouse));

        warehouse.health_check().await.map_err(|e| {
            tracing::error!(error = %e, "BigQuery connection check failed");
            AppError::ConfigError(e.into())
        })?;
        tracing::info!("BigQuery client initialized and connection verified");

        let maps = MapsClient::new(config.maps);
        Self::with_clients(config.common, warehouse, maps).await
    }

    /// Bind the listener against already constructed clients.
    pub async fn with_clients(
        config: Config,
        warehouse: SharedWarehouse,
        maps: MapsClient,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: router(AppState {
                warehouse,
                maps: Arc::new(maps),
            }),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = SERVICE_NAME,
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        serve(self.listener, self.router).await
    }
}
