use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{row, tables};
use uuid::Uuid;

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct HarvestLogged {
    pub status: &'static str,
    pub harvest_id: String,
    pub message: &'static str,
}

/// `POST /harvest`: record a new harvest.
pub async fn log_harvest(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<HarvestLogged>, AppError> {
    body.require(&["farm_id", "product_id", "harvested_quantity_kg", "harvest_date"])?;

    let harvest_date = body.required_date("harvest_date")?;
    let harvested_quantity_kg = body.required_int("harvested_quantity_kg")?;
    let estimated_yield_kg = body.optional_int("estimated_yield_kg")?;
    let quality_score = body.optional_number("quality_score")?;
    let planting_date = body.optional_date("planting_date")?;

    let harvest_id = Uuid::new_v4().to_string();
    let record = row(json!({
        "harvest_id": harvest_id,
        "farm_id": body.value("farm_id"),
        "product_id": body.value("product_id"),
        "product_name": body.value("product_name"),
        "category": body.value("category"),
        "harvest_date": harvest_date.to_string(),
        "harvested_quantity_kg": harvested_quantity_kg,
        "estimated_yield_kg": estimated_yield_kg,
        "quality_score": quality_score,
        "quality_notes": body.value_or("quality_notes", ""),
        "photos_gcs_path": body.value("photos_gcs_path"),
        "planting_date": planting_date.map(|d| d.to_string()),
        "field_id": body.value("field_id"),
    }));

    state
        .warehouse
        .insert_rows(tables::HARVEST_RECORDS, &[record])
        .await
        .map_err(|e| AppError::warehouse("Failed to log harvest record.", e))?;

    metrics::counter!("harvests_logged_total").increment(1);
    tracing::info!(
        harvest_id = %harvest_id,
        quantity_kg = harvested_quantity_kg,
        "Harvest record logged"
    );

    Ok(Json(HarvestLogged {
        status: "success",
        harvest_id,
        message: "Harvest record logged successfully.",
    }))
}
