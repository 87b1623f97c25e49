//! Test helper module for routing-service integration tests.

#![allow(dead_code)]

use routing_service::config::MapsConfig;
use routing_service::services::MapsClient;
use routing_service::startup::Application;
use secrecy::Secret;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use service_core::observability::init_metrics;
use service_core::warehouse::MockWarehouse;
use std::sync::Arc;
use wiremock::MockServer;

pub const MAPS_KEY: &str = "test-maps-key";
pub const GEOCODE_PATH: &str = "/maps/api/geocode/json";
pub const ROUTES_PATH: &str = "/directions/v2:computeRoutes";

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub warehouse: Arc<MockWarehouse>,
    /// Stands in for both the Geocoding and Routes APIs.
    pub maps_server: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn_with(warehouse: MockWarehouse) -> Self {
        Self::spawn_inner(warehouse, Some(MAPS_KEY)).await
    }

    pub async fn spawn_without_maps_key(warehouse: MockWarehouse) -> Self {
        Self::spawn_inner(warehouse, None).await
    }

    async fn spawn_inner(warehouse: MockWarehouse, maps_key: Option<&str>) -> Self {
        init_metrics();

        let maps_server = MockServer::start().await;
        let maps = MapsClient::new(MapsConfig {
            api_key: maps_key.map(|k| Secret::new(k.to_string())),
            geocoding_url: format!("{}{}", maps_server.uri(), GEOCODE_PATH),
            routes_url: format!("{}{}", maps_server.uri(), ROUTES_PATH),
        });

        let warehouse = Arc::new(warehouse);
        let config = CoreConfig {
            port: 0, // Random port
            log_level: "warn".to_string(),
            otlp_endpoint: None,
        };

        let app = Application::with_clients(config, warehouse.clone(), maps)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            warehouse,
            maps_server,
            client,
        }
    }

    pub async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
