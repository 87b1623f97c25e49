use axum::{Json, extract::State};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::{JsonBody, to_float};
use service_core::warehouse::{Query, scalar_or_zero, tables};

use crate::startup::AppState;

const AVAILABILITY_WINDOW_DAYS: u32 = 7;
const COLD_CHAIN_PROBABILITY: f64 = 0.9;

#[derive(Debug, Serialize)]
pub struct PickupConfirmation {
    pub request_status: &'static str,
    pub estimated_pickup_datetime: String,
    pub confirmed_quantity_kg: i64,
    pub message: &'static str,
    pub requires_cold_chain: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PickupResponse {
    Scheduled {
        status: &'static str,
        details: PickupConfirmation,
    },
    Unavailable {
        status: &'static str,
        message: String,
    },
}

/// Pickup estimate: the requested day plus 0-2 days, between 08:00 and 16:59.
fn estimate_pickup<R: Rng + ?Sized>(rng: &mut R, requested: NaiveDate) -> NaiveDateTime {
    requested.and_time(chrono::NaiveTime::MIN)
        + Duration::days(rng.gen_range(0..=2))
        + Duration::hours(rng.gen_range(8..=16))
        + Duration::minutes(rng.gen_range(0..=59))
}

fn confirm_pickup<R: Rng + ?Sized>(
    rng: &mut R,
    requested: NaiveDate,
    quantity_kg: i64,
) -> PickupConfirmation {
    PickupConfirmation {
        request_status: "Acknowledged",
        estimated_pickup_datetime: estimate_pickup(rng, requested)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        confirmed_quantity_kg: quantity_kg,
        message: "Pickup request received and appears feasible. Logistics is being notified and will confirm exact details.",
        requires_cold_chain: rng.gen_bool(COLD_CHAIN_PROBABILITY),
    }
}

/// `POST /schedule/pickup`: check recent harvests cover the requested
/// quantity and hand back a simulated logistics acknowledgement.
pub async fn schedule_pickup(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<PickupResponse>, AppError> {
    body.require(&["farm_id", "product_id", "quantity_kg", "requested_date"])?;

    let requested_date = body.required_date("requested_date")?;
    let quantity_kg = body.required_int("quantity_kg")?;
    let farm_id = body.required_text("farm_id")?;
    let product_id = body.required_text("product_id")?;

    let query = Query::new(format!(
        "SELECT SUM(harvested_quantity_kg) AS total_harvested \
         FROM {} \
         WHERE farm_id = @farm_id AND product_id = @product_id \
         AND harvest_date >= DATE_SUB(@requested_date, INTERVAL {} DAY)",
        state.warehouse.table(tables::HARVEST_RECORDS),
        AVAILABILITY_WINDOW_DAYS
    ))
    .string("farm_id", farm_id.as_str())
    .string("product_id", product_id.as_str())
    .date("requested_date", requested_date);

    let rows = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Failed to check farm availability.", e))?;

    let available_kg = scalar_or_zero(&rows, "total_harvested");
    let available = to_float(&available_kg).unwrap_or(0.0);

    if available < quantity_kg as f64 {
        tracing::info!(
            farm_id = %farm_id,
            product_id = %product_id,
            requested_kg = quantity_kg,
            available_kg = available,
            "Pickup unavailable"
        );
        return Ok(Json(PickupResponse::Unavailable {
            status: "unavailable",
            message: format!(
                "Unable to schedule pickup for {} kg. Only found approximately {} kg recently harvested or on hand for this product at this farm. Please adjust quantity or date.",
                quantity_kg, available_kg
            ),
        }));
    }

    let details = confirm_pickup(&mut rand::thread_rng(), requested_date, quantity_kg);
    tracing::info!(
        farm_id = %farm_id,
        product_id = %product_id,
        pickup_at = %details.estimated_pickup_datetime,
        "Pickup acknowledged"
    );

    Ok(Json(PickupResponse::Scheduled {
        status: "success",
        details,
    }))
}
