use axum::Json;
use serde::Serialize;
use service_core::extract::JsonBody;

const REQUIRED_FIELDS: [&str; 4] = ["farm_id", "product_id", "quantity_kg", "requested_date"];

#[derive(Debug, Serialize)]
pub struct PickupAck {
    pub status: &'static str,
    pub message: String,
}

/// `POST /logistics/schedule-pickup-request`: receiving end of a farm pickup
/// request.
///
/// The caller may be an asynchronous trigger, so validation problems are
/// reported in the body with a 200 rather than as an HTTP error.
pub async fn acknowledge_pickup_request(body: JsonBody) -> Json<PickupAck> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !body.contains(f))
        .collect();

    if !missing.is_empty() {
        let fields = missing.join(", ");
        tracing::warn!(missing = %fields, "Logistics pickup request missing fields");
        return Json(PickupAck {
            status: "error",
            message: format!(
                "Logistics Pickup Request Error: Missing required fields: {}",
                fields
            ),
        });
    }

    tracing::info!(
        farm_id = %body.value("farm_id"),
        product_id = %body.value("product_id"),
        quantity_kg = %body.value("quantity_kg"),
        requested_date = %body.value("requested_date"),
        "Logistics received pickup request"
    );

    Json(PickupAck {
        status: "acknowledged",
        message: "Pickup request received by Logistics.".to_string(),
    })
}
