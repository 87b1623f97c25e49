//! Access to the analytical warehouse that holds every supply-chain table.
//!
//! Handlers talk to the [`Warehouse`] trait. Production wires in
//! [`BigQueryClient`]; service tests wire in [`MockWarehouse`].

mod auth;
mod bigquery;
mod mock;
mod query;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub use auth::TokenSource;
pub use bigquery::BigQueryClient;
pub use mock::MockWarehouse;
pub use query::{Conditions, ParamType, ParamValue, Query, QueryParameter};

/// Table names in the shared dataset.
pub mod tables {
    pub const FARM_PROFILES: &str = "farm_profiles";
    pub const HARVEST_RECORDS: &str = "harvest_records";
    pub const FARM_QC_ISSUES: &str = "farm_qc_issues";
    pub const PLANTING_SCHEDULES: &str = "planting_schedules";

    pub const CUSTOMERS: &str = "customers";
    pub const PRODUCT_CATALOG: &str = "product_catalog";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const DEMAND_FORECASTS: &str = "demand_forecasts";
    pub const MARKET_PRICES: &str = "market_prices";
    pub const PROMOTIONS: &str = "promotions";

    pub const WAREHOUSES: &str = "warehouses";
    pub const VEHICLES: &str = "vehicles";
    pub const SHIPMENTS: &str = "shipments";
    pub const INVENTORY_STOCK: &str = "inventory_stock";
    pub const INVENTORY_MOVEMENTS: &str = "inventory_movements";
    pub const COLD_CHAIN_READINGS: &str = "cold_chain_readings";
}

/// One result or insert row, keyed by column name.
pub type Row = Map<String, Value>;

/// Shared handle stored in service state.
pub type SharedWarehouse = Arc<dyn Warehouse>;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("BigQuery table not found: {0}")]
    TableNotFound(String),

    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Row-level rejection from a streaming insert.
    #[error("{0}")]
    Insert(String),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Query did not complete within {0} seconds")]
    Timeout(u64),

    #[error("Unexpected BigQuery response: {0}")]
    Decode(String),

    #[error("BigQuery request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Fully-qualified, backtick-quoted identifier for a table in the configured dataset.
    fn table(&self, name: &str) -> String;

    /// Run a parameterized query and return every result row.
    async fn query(&self, query: &Query) -> Result<Vec<Row>, WarehouseError>;

    /// Stream rows into a table of the configured dataset.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError>;

    /// Verify connectivity with a trivial query.
    async fn health_check(&self) -> Result<(), WarehouseError> {
        self.query(&Query::new("SELECT 1")).await.map(|_| ())
    }
}

/// Row from a JSON object literal. Anything else yields an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// First row of a result set, if any.
pub fn first_row(rows: Vec<Row>) -> Option<Row> {
    rows.into_iter().next()
}

/// Numeric column of the first row, treating NULL or absence as zero.
///
/// Aggregates such as `SUM(...)` come back NULL when nothing matched.
pub fn scalar_or_zero(rows: &[Row], column: &str) -> Value {
    rows.first()
        .and_then(|row| row.get(column))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(0))
}
