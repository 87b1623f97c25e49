use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Conditions, Query, Row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct WarehouseStock {
    pub status: &'static str,
    pub location_id: Value,
    pub stock_items: Vec<Row>,
}

/// `POST /inventory/stock`: freshest-first stock at one warehouse.
pub async fn check_warehouse_stock(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<WarehouseStock>, AppError> {
    body.require(&["location_id"])?;
    let location_id = body.required_text("location_id")?;
    let status_filter = body.text("status").unwrap_or_else(|| "Available".to_string());

    let mut conditions = Conditions::new();
    conditions
        .push("location_id = @location_id")
        .push("status = @status_filter");
    let mut query = Query::new("")
        .string("location_id", location_id.as_str())
        .string("status_filter", status_filter);

    if let Some(product_id) = body.non_empty_text("product_id") {
        conditions.push("product_id = @product_id");
        query = query.string("product_id", product_id);
    }
    if body.flag("nearing_expiry") {
        conditions.push("expiry_date BETWEEN CURRENT_DATE() AND DATE_ADD(CURRENT_DATE(), INTERVAL 7 DAY)");
    }

    query.sql = format!(
        "SELECT stock_id, product_id, current_quantity_kg, entry_date, best_before_date, \
         expiry_date, storage_conditions, status \
         FROM {} {} \
         ORDER BY expiry_date ASC, best_before_date ASC \
         LIMIT 20",
        state.warehouse.table(tables::INVENTORY_STOCK),
        conditions.to_sql()
    );

    let stock_items = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Failed to retrieve warehouse stock.", e))?;

    Ok(Json(WarehouseStock {
        status: "success",
        location_id: body.value("location_id"),
        stock_items,
    }))
}
