use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Query, Row, first_row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VehicleLookup {
    Found {
        matches: Vec<Row>,
    },
    NotFound {
        status: &'static str,
        message: String,
        matches: Vec<Row>,
    },
}

/// `POST /vehicles/lookup`: exact match on licence plate.
pub async fn lookup_vehicle(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<(StatusCode, Json<VehicleLookup>), AppError> {
    let license_no = body
        .non_empty_text("vehicle_license_no")
        .ok_or_else(|| AppError::bad_request("Missing or empty vehicle_license_no in request body"))?;

    let query = Query::new(format!(
        "SELECT vehicle_id, carrier_name, vehicle_type, capacity_kg, \
         has_temperature_monitoring, vehicle_license_no \
         FROM {} WHERE vehicle_license_no = @license_no LIMIT 1",
        state.warehouse.table(tables::VEHICLES)
    ))
    .string("license_no", license_no.as_str());

    let rows = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Internal server error during vehicle lookup", e))?;

    match first_row(rows) {
        Some(vehicle) => {
            tracing::info!(license_no = %license_no, vehicle_id = ?vehicle.get("vehicle_id"), "Found vehicle");
            Ok((StatusCode::OK, Json(VehicleLookup::Found { matches: vec![vehicle] })))
        }
        None => {
            tracing::warn!(license_no = %license_no, "Vehicle not found");
            Ok((
                StatusCode::NOT_FOUND,
                Json(VehicleLookup::NotFound {
                    status: "not_found",
                    message: format!("Vehicle with license '{}' not found", license_no),
                    matches: Vec::new(),
                }),
            ))
        }
    }
}
