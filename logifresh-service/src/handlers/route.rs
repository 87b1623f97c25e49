use axum::{Json, extract::State};
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::extract::{JsonBody, as_text};
use service_core::warehouse::{Query, Row, first_row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct RouteStop {
    pub stop_number: usize,
    pub destination_id: Value,
    pub destination_address: Value,
    pub estimated_arrival_time: String,
    pub estimated_service_duration_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RouteResponse {
    Planned {
        status: &'static str,
        vehicle_id: Value,
        num_stops: usize,
        estimated_total_duration_minutes: i64,
        route_stops: Vec<RouteStop>,
        message: &'static str,
    },
    NotPlanned {
        status: &'static str,
        message: String,
    },
}

/// Visit the destinations in random order with a fixed per-leg duration.
fn simulate_route<R: Rng + ?Sized>(
    rng: &mut R,
    mut destinations: Vec<Row>,
    departure: NaiveDateTime,
) -> (i64, Vec<RouteStop>) {
    let leg_minutes: i64 = rng.gen_range(30..=90);
    destinations.shuffle(rng);

    let mut at = departure;
    let stops: Vec<RouteStop> = destinations
        .into_iter()
        .enumerate()
        .map(|(i, mut customer)| {
            at += Duration::minutes(leg_minutes);
            RouteStop {
                stop_number: i + 1,
                destination_id: customer.remove("customer_id").unwrap_or(Value::Null),
                destination_address: customer.remove("shipping_address").unwrap_or(Value::Null),
                estimated_arrival_time: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                estimated_service_duration_minutes: rng.gen_range(15..=45),
            }
        })
        .collect();

    (stops.len() as i64 * leg_minutes, stops)
}

/// `POST /route/optimize`: simulated multi-stop route for a vehicle.
///
/// Destinations are customer ids; unknown ids are dropped.
pub async fn optimize_delivery_route(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<RouteResponse>, AppError> {
    body.require(&["destination_locations", "vehicle_id"])?;
    let destinations = body.non_empty_list("destination_locations")?;
    let vehicle_id = body.required_text("vehicle_id")?;

    let vehicle_query = Query::new(format!(
        "SELECT vehicle_id, vehicle_type, capacity_kg, has_temperature_monitoring, carrier_name \
         FROM {} WHERE vehicle_id = @vehicle_id LIMIT 1",
        state.warehouse.table(tables::VEHICLES)
    ))
    .string("vehicle_id", vehicle_id.as_str());

    let vehicles = state
        .warehouse
        .query(&vehicle_query)
        .await
        .map_err(|e| AppError::warehouse("Failed to retrieve vehicle details.", e))?;

    if first_row(vehicles).is_none() {
        return Ok(Json(RouteResponse::NotPlanned {
            status: "not_found",
            message: format!("Vehicle ID {} not found.", vehicle_id),
        }));
    }

    let customer_ids: Vec<String> = destinations.iter().filter_map(as_text).collect();
    let customer_query = Query::new(format!(
        "SELECT customer_id, shipping_address FROM {} WHERE customer_id IN UNNEST(@customer_ids)",
        state.warehouse.table(tables::CUSTOMERS)
    ))
    .string_array("customer_ids", customer_ids);

    let customers = match state.warehouse.query(&customer_query).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to lookup customer locations");
            Vec::new()
        }
    };

    if customers.is_empty() {
        return Ok(Json(RouteResponse::NotPlanned {
            status: "unavailable",
            message: "Could not find valid destinations based on provided IDs.".to_string(),
        }));
    }

    let (total_minutes, route_stops) =
        simulate_route(&mut rand::thread_rng(), customers, Utc::now().naive_utc());

    tracing::info!(
        vehicle_id = %vehicle_id,
        stops = route_stops.len(),
        total_minutes,
        "Simulated delivery route generated"
    );

    Ok(Json(RouteResponse::Planned {
        status: "success",
        vehicle_id: body.value("vehicle_id"),
        num_stops: route_stops.len(),
        estimated_total_duration_minutes: total_minutes,
        route_stops,
        message: "Simulated route generated.",
    }))
}
