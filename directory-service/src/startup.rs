//! Application startup and lifecycle management.

use axum::Router;
use service_core::config::Config;
use service_core::error::AppError;
use service_core::server::{HealthState, finish_router, health_router, post_only, serve};
use service_core::warehouse::{BigQueryClient, SharedWarehouse};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::DirectoryConfig;
use crate::handlers::{lookup_customers, lookup_farms, lookup_products, lookup_vehicle};

pub const SERVICE_NAME: &str = "directory-service";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub warehouse: SharedWarehouse,
}

pub fn router(state: AppState) -> Router {
    let health = health_router(HealthState {
        service: SERVICE_NAME,
        banner: None,
        warehouse: Some(state.warehouse.clone()),
    });

    let api = Router::new()
        .route("/farms/lookup", post_only(lookup_farms))
        .route("/products/lookup", post_only(lookup_products))
        .route("/customers/lookup", post_only(lookup_customers))
        .route("/vehicles/lookup", post_only(lookup_vehicle))
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
    pub async fn build(config: DirectoryConfig) -> Result<Self, AppError> {
        let warehouse: SharedWarehouse = Arc::new(BigQueryClient::new(&config.warehouse));

        warehouse.health_check().await.map_err(|e| {
            tracing::error!(error = %e, "BigQuery connection check failed");
            AppError::ConfigError(e.into())
        })?;
        tracing::info!("BigQuery client initialized and connection verified");

        Self::with_warehouse(config.common, warehouse).await
    }

    /// Bind the listener against an already constructed warehouse.
    pub async fn with_warehouse(config: Config, warehouse: SharedWarehouse) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: router(AppState { warehouse }),
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
