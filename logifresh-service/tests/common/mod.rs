//! Test helper module for logifresh-service integration tests.

#![allow(dead_code)]

use logifresh_service::startup::Application;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use service_core::observability::init_metrics;
use service_core::warehouse::MockWarehouse;
use std::sync::Arc;

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub warehouse: Arc<MockWarehouse>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn against an empty warehouse.
    pub async fn spawn() -> Self {
        Self::spawn_with(MockWarehouse::new()).await
    }

    /// Spawn on a random port against the given scripted warehouse.
    pub async fn spawn_with(warehouse: MockWarehouse) -> Self {
        init_metrics();

        let warehouse = Arc::new(warehouse);
        let config = CoreConfig {
            port: 0, // Random port
            log_level: "warn".to_string(),
            otlp_endpoint: None,
        };

        let app = Application::with_warehouse(config, warehouse.clone())
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
