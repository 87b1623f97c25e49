use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Query, Row, first_row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ShipmentStatus {
    Found {
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        shipment_details: Row,
        recent_cold_chain_readings: Vec<Row>,
    },
    NotFound {
        status: &'static str,
        message: String,
    },
}

/// `POST /shipment/status`: shipment record plus its latest cold chain readings.
pub async fn track_shipment(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<ShipmentStatus>, AppError> {
    body.require(&["shipment_id"])?;
    let shipment_id = body.required_text("shipment_id")?;

    let query = Query::new(format!(
        "SELECT shipment_id, order_id, origin_location_id, destination_location_id, \
         departure_timestamp, arrival_timestamp_estimate, arrival_timestamp_actual, \
         carrier_name, vehicle_id, status, total_quantity_kg, requires_cold_chain \
         FROM {} WHERE shipment_id = @shipment_id LIMIT 1",
        state.warehouse.table(tables::SHIPMENTS)
    ))
    .string("shipment_id", shipment_id.as_str());

    let rows = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Failed to retrieve shipment details.", e))?;

    let Some(shipment) = first_row(rows) else {
        return Ok(Json(ShipmentStatus::NotFound {
            status: "not_found",
            message: format!("Shipment ID {} not found.", shipment_id),
        }));
    };

    let requires_cold_chain = shipment
        .get("requires_cold_chain")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if !requires_cold_chain {
        return Ok(Json(ShipmentStatus::Found {
            status: "success",
            message: None,
            details: None,
            shipment_details: shipment,
            recent_cold_chain_readings: Vec::new(),
        }));
    }

    let readings_query = Query::new(format!(
        "SELECT timestamp, temperature_celsius, location, sensor_id \
         FROM {} WHERE shipment_id = @shipment_id_cc \
         ORDER BY timestamp DESC LIMIT 10",
        state.warehouse.table(tables::COLD_CHAIN_READINGS)
    ))
    .string("shipment_id_cc", shipment_id.as_str());

    match state.warehouse.query(&readings_query).await {
        Ok(readings) => Ok(Json(ShipmentStatus::Found {
            status: "success",
            message: None,
            details: None,
            shipment_details: shipment,
            recent_cold_chain_readings: readings,
        })),
        Err(e) => {
            tracing::warn!(
                shipment_id = %shipment_id,
                error = %e,
                "Failed to retrieve cold chain readings"
            );
            Ok(Json(ShipmentStatus::Found {
                status: "warning",
                message: Some("Data retrieval issues encountered."),
                details: Some(format!("Cold chain query failed: {}", e)),
                shipment_details: shipment,
                recent_cold_chain_readings: Vec::new(),
            }))
        }
    }
}
