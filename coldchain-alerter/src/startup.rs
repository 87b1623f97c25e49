//! Application startup and lifecycle management.

use axum::Router;
use service_core::config::Config;
use service_core::error::AppError;
use service_core::server::{HealthState, finish_router, health_router, post_only, serve};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::handlers::receive_push;

pub const SERVICE_NAME: &str = "coldchain-alerter";

/// Push subscriptions deliver to `/`, so no banner is mounted there.
pub fn router() -> Router {
    let health = health_router(HealthState {
        service: SERVICE_NAME,
        banner: None,
        warehouse: None,
    });

    let api = Router::new().route("/", post_only(receive_push));

    finish_router(api.merge(health))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: router(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

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
