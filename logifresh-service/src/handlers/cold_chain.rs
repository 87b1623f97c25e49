use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;
use service_core::extract::{JsonBody, normalize_timestamp};
use service_core::warehouse::{row, tables};
use uuid::Uuid;

use crate::startup::AppState;

const ELEVATED_CELSIUS: f64 = 8.0;
const CRITICAL_CELSIUS: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Excursion {
    Normal,
    Elevated,
    Critical,
}

impl Excursion {
    pub fn classify(temperature_celsius: f64) -> Self {
        if temperature_celsius > CRITICAL_CELSIUS {
            Excursion::Critical
        } else if temperature_celsius > ELEVATED_CELSIUS {
            Excursion::Elevated
        } else {
            Excursion::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Excursion::Normal => "normal",
            Excursion::Elevated => "elevated",
            Excursion::Critical => "critical",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Excursion::Normal => "Cold chain reading reported successfully.",
            Excursion::Elevated => {
                "Cold chain reading reported successfully. Warning: Temperature is elevated."
            }
            Excursion::Critical => "Critical: High temperature excursion reported.",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadingReported {
    pub status: &'static str,
    pub reading_id: String,
    pub message: &'static str,
}

/// `POST /issue/coldchain`: record a temperature reading for a shipment.
pub async fn report_cold_chain_reading(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<ReadingReported>, AppError> {
    body.require(&["shipment_id", "temperature_celsius", "timestamp"])?;

    let temperature_celsius = body.required_number("temperature_celsius")?;
    let timestamp = body
        .get("timestamp")
        .and_then(normalize_timestamp)
        .ok_or_else(|| AppError::bad_request("Invalid timestamp format. Expected ISO 8601 format."))?;

    let reading_id = Uuid::new_v4().to_string();
    let record = row(json!({
        "reading_id": reading_id,
        "shipment_id": body.value("shipment_id"),
        "vehicle_id": body.value("vehicle_id"),
        "timestamp": timestamp,
        "temperature_celsius": temperature_celsius,
        "location": body.value("location"),
        "sensor_id": body.value_or("sensor_id", "Unknown"),
    }));

    state
        .warehouse
        .insert_rows(tables::COLD_CHAIN_READINGS, &[record])
        .await
        .map_err(|e| AppError::warehouse("Failed to report cold chain reading.", e))?;

    let excursion = Excursion::classify(temperature_celsius);
    metrics::counter!("cold_chain_readings_total", "severity" => excursion.as_str()).increment(1);

    match excursion {
        Excursion::Critical => tracing::warn!(
            reading_id = %reading_id,
            temperature_celsius,
            "Critical cold chain excursion reported"
        ),
        _ => tracing::info!(
            reading_id = %reading_id,
            temperature_celsius,
            severity = excursion.as_str(),
            "Cold chain reading recorded"
        ),
    }

    Ok(Json(ReadingReported {
        status: "success",
        reading_id,
        message: excursion.message(),
    }))
}
