use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Conditions, Query, Row, WarehouseError, scalar_or_zero, tables};

use crate::startup::AppState;

/// Planting schedule states that still lead to a harvest.
const PENDING_HARVEST_STATUSES: &str = "('Planned', 'Planted', 'Growing', 'Harvesting')";

#[derive(Debug, Serialize)]
pub struct Availability {
    pub status: &'static str,
    pub product_id: Value,
    pub location_id: Value,
    pub total_on_hand_kg: Value,
    pub num_stock_locations: Value,
    pub total_incoming_shipments_kg: Value,
    pub total_upcoming_harvest_kg: Value,
}

fn stock_query(table: &str, product_id: &str, location_id: Option<&str>) -> Query {
    let mut conditions: Conditions = ["product_id = @product_id", "status = 'Available'"]
        .into_iter()
        .collect();
    let mut query = Query::new("").string("product_id", product_id);

    if let Some(location_id) = location_id {
        conditions.push("location_id = @location_id_stock");
        query = query.string("location_id_stock", location_id);
    }

    query.sql = format!(
        "SELECT SUM(current_quantity_kg) AS total_on_hand, \
         COUNT(DISTINCT location_id) AS num_locations \
         FROM {} {}",
        table,
        conditions.to_sql()
    );
    query
}

fn incoming_query(shipments: &str, order_items: &str, product_id: &str) -> Query {
    Query::new(format!(
        "SELECT SUM(t2.ordered_quantity_kg) AS total_incoming_shipments \
         FROM {} t1 JOIN {} t2 ON t1.order_id = t2.order_id \
         WHERE t2.product_id = @product_id_shipment AND t1.status = 'In Transit' \
         AND t1.arrival_timestamp_estimate >= CURRENT_TIMESTAMP()",
        shipments, order_items
    ))
    .string("product_id_shipment", product_id)
}

fn upcoming_harvest_query(table: &str, product_id: &str) -> Query {
    Query::new(format!(
        "SELECT SUM(expected_yield_estimate_kg) AS total_upcoming_harvest \
         FROM {} \
         WHERE product_id = @product_id_sched \
         AND planned_harvest_date_estimate >= CURRENT_DATE() \
         AND status IN {}",
        table, PENDING_HARVEST_STATUSES
    ))
    .string("product_id_sched", product_id)
}

/// `POST /inventory/available`: stock on hand, stock in transit and stock
/// still in the ground for one product.
///
/// The location filter only narrows the on-hand figure.
pub async fn check_product_availability(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Availability>, AppError> {
    body.require(&["product_id"])?;
    let product_id = body.required_text("product_id")?;
    let location_id = body.non_empty_text("location_id");
    let warehouse = &state.warehouse;

    let mut failures: Vec<String> = Vec::new();
    let mut collect = |label: &str, result: Result<Vec<Row>, WarehouseError>| match result {
        Ok(rows) => rows,
        Err(e) => {
            failures.push(format!("{} query failed: {}", label, e));
            Vec::new()
        }
    };

    let stock = collect(
        "Stock",
        warehouse
            .query(&stock_query(
                &warehouse.table(tables::INVENTORY_STOCK),
                &product_id,
                location_id.as_deref(),
            ))
            .await,
    );
    let incoming = collect(
        "Shipment",
        warehouse
            .query(&incoming_query(
                &warehouse.table(tables::SHIPMENTS),
                &warehouse.table(tables::ORDER_ITEMS),
                &product_id,
            ))
            .await,
    );
    let upcoming = collect(
        "Schedule",
        warehouse
            .query(&upcoming_harvest_query(
                &warehouse.table(tables::PLANTING_SCHEDULES),
                &product_id,
            ))
            .await,
    );

    if !failures.is_empty() {
        return Err(AppError::failure(
            "Failed to retrieve availability data.",
            failures.join(" | "),
        ));
    }

    Ok(Json(Availability {
        status: "success",
        product_id: body.value("product_id"),
        location_id: body.value("location_id"),
        total_on_hand_kg: scalar_or_zero(&stock, "total_on_hand"),
        num_stock_locations: scalar_or_zero(&stock, "num_locations"),
        total_incoming_shipments_kg: scalar_or_zero(&incoming, "total_incoming_shipments"),
        total_upcoming_harvest_kg: scalar_or_zero(&upcoming, "total_upcoming_harvest"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_only_narrows_stock() {
        let q = stock_query("`p.d.inventory_stock`", "PROD-1", Some("WH-1"));
        assert!(q.sql.contains(
            "WHERE product_id = @product_id AND status = 'Available' AND location_id = @location_id_stock"
        ));
        assert!(q.param("location_id_stock").is_some());

        let q = stock_query("`p.d.inventory_stock`", "PROD-1", None);
        assert!(!q.sql.contains("location_id = "));
    }

    #[test]
    fn upcoming_harvest_counts_unharvested_schedules() {
        let q = upcoming_harvest_query("`p.d.planting_schedules`", "PROD-1");
        assert!(q.sql.contains("status IN ('Planned', 'Planted', 'Growing', 'Harvesting')"));
        assert!(q.param("product_id_sched").is_some());
    }
}
