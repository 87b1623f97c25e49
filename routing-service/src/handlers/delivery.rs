use axum::{Json, extract::State, http::StatusCode};
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::extract::{JsonBody, as_text, to_float};
use service_core::warehouse::{Query, Row, first_row, tables};

use crate::services::{LatLng, RouteLeg, parse_duration_secs};
use crate::startup::AppState;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An order stop with resolved coordinates.
#[derive(Debug, Clone)]
struct Destination {
    order_id: Value,
    address: Value,
    coordinates: LatLng,
    total_kg: f64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RouteStop {
    Origin {
        stop_number: usize,
        location_id: String,
        location_type: &'static str,
        estimated_arrival_time: String,
        estimated_duration_from_previous_stop: String,
        estimated_distance_from_previous_stop_meters: i64,
    },
    Delivery {
        stop_number: usize,
        destination_id: Value,
        destination_address: Value,
        estimated_arrival_time: String,
        estimated_duration_from_previous_stop: String,
        estimated_distance_from_previous_stop_meters: i64,
        total_kg_for_stop: f64,
    },
}

#[derive(Debug, Serialize)]
pub struct CapacityCheck {
    pub vehicle_capacity_kg: f64,
    pub total_load_kg: f64,
    pub exceeds_capacity: bool,
}

#[derive(Debug, Serialize)]
pub struct PlannedRoute {
    pub status: &'static str,
    pub vehicle_id: Value,
    pub num_stops_on_route: usize,
    pub estimated_total_duration: String,
    pub estimated_total_distance_meters: i64,
    pub polyline: Option<String>,
    pub route_stops: Vec<RouteStop>,
    pub route_date: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_check: Option<CapacityCheck>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DeliveryRouteResponse {
    Planned(PlannedRoute),
    NotPlanned {
        status: &'static str,
        message: String,
    },
}

fn not_planned(
    code: StatusCode,
    status: &'static str,
    message: impl Into<String>,
) -> (StatusCode, Json<DeliveryRouteResponse>) {
    (
        code,
        Json(DeliveryRouteResponse::NotPlanned {
            status,
            message: message.into(),
        }),
    )
}

/// Coordinates embedded in synthetic location strings: `Lat: 36.67, Lon: -121.65`.
pub fn parse_lat_lon(raw: &str) -> Option<LatLng> {
    let rest = raw.trim().strip_prefix("Lat:")?;
    let (lat, lon) = rest.split_once(',')?;
    let lon = lon.trim().strip_prefix("Lon:")?;
    Some(LatLng {
        latitude: lat.trim().parse().ok()?,
        longitude: lon.trim().parse().ok()?,
    })
}

/// Resolve a location string to coordinates, geocoding when it has none embedded.
///
/// Geocoding failures are logged and yield `None`.
async fn resolve(state: &AppState, location: &str) -> Option<LatLng> {
    if let Some(coordinates) = parse_lat_lon(location) {
        return Some(coordinates);
    }

    match state.maps.geocode(location).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(location = %location, error = %e, "Geocoding failed");
            None
        }
    }
}

/// Origin stop plus one stop per leg, with arrival times accumulated from `departure`.
fn build_stops(
    origin_id: &str,
    departure: NaiveDateTime,
    destinations: &[Destination],
    legs: &[RouteLeg],
) -> Vec<RouteStop> {
    let mut stops = vec![RouteStop::Origin {
        stop_number: 0,
        location_id: origin_id.to_string(),
        location_type: "Origin",
        estimated_arrival_time: departure.format(TIMESTAMP_FORMAT).to_string(),
        estimated_duration_from_previous_stop: "0s".to_string(),
        estimated_distance_from_previous_stop_meters: 0,
    }];

    let mut elapsed_ms: i64 = 0;
    for (i, (leg, destination)) in legs.iter().zip(destinations).enumerate() {
        let duration = leg.duration.clone().unwrap_or_else(|| "0s".to_string());
        let seconds = parse_duration_secs(&duration).unwrap_or_else(|| {
            tracing::warn!(duration = %duration, "Unparseable leg duration");
            0.0
        });
        elapsed_ms += (seconds * 1000.0).round() as i64;

        stops.push(RouteStop::Delivery {
            stop_number: i + 1,
            destination_id: destination.order_id.clone(),
            destination_address: destination.address.clone(),
            estimated_arrival_time: (departure + Duration::milliseconds(elapsed_ms))
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            estimated_duration_from_previous_stop: duration,
            estimated_distance_from_previous_stop_meters: leg.distance_meters.unwrap_or(0),
            total_kg_for_stop: destination.total_kg,
        });
    }
    stops
}

/// Keep results in the order the caller listed the order ids.
fn in_request_order(mut rows: Vec<Row>, order_ids: &[String]) -> Vec<Row> {
    let position = |row: &Row| {
        row.get("order_id")
            .and_then(as_text)
            .and_then(|id| order_ids.iter().position(|o| *o == id))
            .unwrap_or(usize::MAX)
    };
    rows.sort_by_key(position);
    rows
}

async fn origin_location(state: &AppState, origin_id: &str) -> Result<Option<String>, AppError> {
    let query = Query::new(format!(
        "SELECT farm_location AS location FROM {} WHERE farm_id = @loc_id \
         UNION ALL \
         SELECT location_address AS location FROM {} WHERE warehouse_id = @loc_id \
         LIMIT 1",
        state.warehouse.table(tables::FARM_PROFILES),
        state.warehouse.table(tables::WAREHOUSES)
    ))
    .string("loc_id", origin_id);

    let rows = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Error retrieving necessary data.", e))?;

    Ok(first_row(rows).and_then(|r| r.get("location").and_then(as_text)))
}

async fn load_destinations(state: &AppState, order_ids: &[String]) -> Vec<Destination> {
    let query = Query::new(format!(
        "SELECT o.order_id, o.delivery_address, SUM(oi.ordered_quantity_kg) AS total_kg \
         FROM {} o \
         JOIN {} oi ON o.order_id = oi.order_id \
         JOIN {} c ON o.customer_id = c.customer_id \
         WHERE o.order_id IN UNNEST(@order_ids) \
         GROUP BY o.order_id, o.delivery_address",
        state.warehouse.table(tables::ORDERS),
        state.warehouse.table(tables::ORDER_ITEMS),
        state.warehouse.table(tables::CUSTOMERS)
    ))
    .string_array("order_ids", order_ids.iter().cloned());

    let rows = match state.warehouse.query(&query).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to retrieve destination orders");
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for mut row in in_request_order(rows, order_ids) {
        let order_id = row.remove("order_id").unwrap_or(Value::Null);
        let address = row.remove("delivery_address").unwrap_or(Value::Null);
        let total_kg = row.get("total_kg").and_then(to_float).unwrap_or(0.0);

        let coordinates = match address.as_str() {
            Some(text) => resolve(state, text).await,
            None => None,
        };
        match coordinates {
            Some(coordinates) => found.push(Destination {
                order_id,
                address,
                coordinates,
                total_kg,
            }),
            None => tracing::warn!(
                order_id = %order_id,
                "No coordinates for order address. Skipping destination."
            ),
        }
    }
    found
}

/// Vehicle capacity in kg. Lookup failures are logged and treated as unknown.
async fn vehicle_capacity(state: &AppState, vehicle_id: &str) -> Option<f64> {
    let query = Query::new(format!(
        "SELECT vehicle_id, vehicle_type, capacity_kg, has_temperature_monitoring, carrier_name \
         FROM {} WHERE vehicle_id = @vehicle_id LIMIT 1",
        state.warehouse.table(tables::VEHICLES)
    ))
    .string("vehicle_id", vehicle_id);

    match state.warehouse.query(&query).await {
        Ok(rows) => {
            let capacity = first_row(rows).and_then(|r| r.get("capacity_kg").and_then(to_float));
            if capacity.is_none() {
                tracing::warn!(vehicle_id = %vehicle_id, "Vehicle not found");
            }
            capacity
        }
        Err(e) => {
            tracing::warn!(vehicle_id = %vehicle_id, error = %e, "Could not retrieve vehicle details");
            None
        }
    }
}

/// `POST /route/delivery`: driving route from a farm or warehouse through a set of orders.
///
/// Stops are visited in the order the ids were given.
pub async fn plan_delivery_route(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<(StatusCode, Json<DeliveryRouteResponse>), AppError> {
    body.require(&["origin_location_id", "destination_order_ids"])?;
    let order_ids: Vec<String> = body
        .non_empty_list("destination_order_ids")?
        .iter()
        .filter_map(as_text)
        .collect();
    let origin_id = body.required_text("origin_location_id")?;

    let origin = match origin_location(&state, &origin_id).await? {
        Some(location) => resolve(&state, &location).await,
        None => None,
    };
    let Some(origin) = origin else {
        tracing::warn!(origin_id = %origin_id, "Origin not found or coordinates unavailable");
        return Ok(not_planned(
            StatusCode::NOT_FOUND,
            "not_found",
            format!(
                "Origin location ID {} not found or coordinates unavailable.",
                origin_id
            ),
        ));
    };

    let destinations = load_destinations(&state, &order_ids).await;
    if destinations.is_empty() {
        return Ok(not_planned(
            StatusCode::OK,
            "unavailable",
            "Could not find valid destinations or coordinates for provided order IDs.",
        ));
    }

    let capacity_check = match body.non_empty_text("vehicle_id") {
        Some(vehicle_id) => vehicle_capacity(&state, &vehicle_id).await.map(|capacity| {
            let total_load_kg: f64 = destinations.iter().map(|d| d.total_kg).sum();
            CapacityCheck {
                vehicle_capacity_kg: capacity,
                total_load_kg,
                exceeds_capacity: total_load_kg > capacity,
            }
        }),
        None => None,
    };

    let stops: Vec<LatLng> = destinations.iter().map(|d| d.coordinates).collect();
    let routes = state
        .maps
        .compute_route(origin, &stops)
        .await
        .map_err(|e| AppError::failure("Failed to compute route via routing service", e))?;

    let Some(route) = routes.routes.into_iter().next() else {
        tracing::warn!("Routes API returned no routes");
        return Ok(not_planned(
            StatusCode::OK,
            "unavailable",
            "Could not compute a route with the provided locations.",
        ));
    };

    let departure =
        Utc::now().naive_utc() + Duration::minutes(rand::thread_rng().gen_range(5..=15));
    let route_stops = build_stops(&origin_id, departure, &destinations, &route.legs);

    tracing::info!(
        origin_id = %origin_id,
        stops = route_stops.len(),
        distance_meters = route.distance_meters.unwrap_or(0),
        "Delivery route computed"
    );

    Ok((
        StatusCode::OK,
        Json(DeliveryRouteResponse::Planned(PlannedRoute {
            status: "success",
            vehicle_id: body.value("vehicle_id"),
            num_stops_on_route: route.legs.len() + 1,
            estimated_total_duration: route.duration.unwrap_or_else(|| "0s".to_string()),
            estimated_total_distance_meters: route.distance_meters.unwrap_or(0),
            polyline: route.polyline.and_then(|p| p.encoded_polyline),
            route_stops,
            route_date: body.value("route_date"),
            capacity_check,
        })),
    ))
}
