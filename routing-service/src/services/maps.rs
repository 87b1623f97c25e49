//! Google Maps Platform client: Geocoding API and Routes API `computeRoutes`.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use thiserror::Error;

use crate::config::MapsConfig;

/// Fields requested from `computeRoutes`.
const ROUTES_FIELD_MASK: &str = "routes.duration,routes.distanceMeters,routes.polyline.encodedPolyline,\
routes.legs.duration,routes.legs.distanceMeters";

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("API Key not configured.")]
    NotConfigured,

    #[error("No valid destinations with coordinates provided.")]
    NoDestinations,

    #[error("Maps API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Geocoding API returned status {status}: {message}")]
    Geocoding { status: String, message: String },

    #[error("Maps API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Waypoint {
    location: WaypointLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaypointLocation {
    lat_lng: LatLng,
}

impl From<LatLng> for Waypoint {
    fn from(lat_lng: LatLng) -> Self {
        Waypoint {
            location: WaypointLocation { lat_lng },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteModifiers {
    avoid_tolls: bool,
    avoid_highways: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputeRoutesRequest {
    origin: Waypoint,
    destination: Waypoint,
    intermediates: Vec<Waypoint>,
    travel_mode: &'static str,
    routing_preference: &'static str,
    compute_alternative_routes: bool,
    route_modifiers: RouteModifiers,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub duration: Option<String>,
    pub distance_meters: Option<i64>,
    pub polyline: Option<Polyline>,
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polyline {
    pub encoded_polyline: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub duration: Option<String>,
    pub distance_meters: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for the Geocoding and Routes APIs.
#[derive(Clone)]
pub struct MapsClient {
    client: Client,
    config: MapsConfig,
}

impl MapsClient {
    pub fn new(config: MapsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if an API key is set.
    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }

    fn api_key(&self) -> Result<&str, MapsError> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
            .ok_or(MapsError::NotConfigured)
    }

    /// Coordinates of the first Geocoding match. `ZERO_RESULTS` is `Ok(None)`.
    #[tracing::instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Option<LatLng>, MapsError> {
        let key = self.api_key()?;
        if address.trim().is_empty() {
            tracing::warn!("Attempted to geocode an empty address string");
            return Ok(None);
        }

        let response = self
            .client
            .traced_get(&self.config.geocoding_url)
            .query(&[("address", address), ("key", key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MapsError::Api {
                status: status.as_u16(),
                message: api_message(&body),
            });
        }

        let result: GeocodeResponse = response.json().await?;
        tracing::debug!(status = %result.status, "Geocoding API response");

        match result.status.as_str() {
            "OK" => Ok(result.results.into_iter().next().map(|r| LatLng {
                latitude: r.geometry.location.lat,
                longitude: r.geometry.location.lng,
            })),
            "ZERO_RESULTS" => {
                tracing::warn!("Geocoding API found no results");
                Ok(None)
            }
            _ => Err(MapsError::Geocoding {
                status: result.status,
                message: result.error_message.unwrap_or_default(),
            }),
        }
    }

    /// Driving route from `origin` through `stops` in the given order.
    ///
    /// The last stop is the final destination, the rest are intermediates.
    #[tracing::instrument(skip(self, stops), fields(stops = stops.len()))]
    pub async fn compute_route(
        &self,
        origin: LatLng,
        stops: &[LatLng],
    ) -> Result<RoutesResponse, MapsError> {
        let key = self.api_key()?;
        let Some((last, intermediates)) = stops.split_last() else {
            return Err(MapsError::NoDestinations);
        };

        let request = ComputeRoutesRequest {
            origin: origin.into(),
            destination: (*last).into(),
            intermediates: intermediates.iter().copied().map(Waypoint::from).collect(),
            travel_mode: "DRIVE",
            routing_preference: "TRAFFIC_AWARE_OPTIMAL",
            compute_alternative_routes: false,
            route_modifiers: RouteModifiers {
                avoid_tolls: false,
                avoid_highways: false,
            },
        };

        let response = self
            .client
            .traced_post(&self.config.routes_url)
            .header("X-Goog-Api-Key", key)
            .header("X-Goog-FieldMask", ROUTES_FIELD_MASK)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Routes API call failed");
            return Err(MapsError::Api {
                status: status.as_u16(),
                message: api_message(&body),
            });
        }

        Ok(response.json().await?)
    }
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Seconds in a protobuf-style duration: `"1234s"`, `"12.5s"` or `"1h2m3s"`.
pub fn parse_duration_secs(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let mut number = String::new();
    for c in raw.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'h' | 'm' | 's' => {
                let value: f64 = number.parse().ok()?;
                total += value
                    * match c {
                        'h' => 3600.0,
                        'm' => 60.0,
                        _ => 1.0,
                    };
                number.clear();
            }
            _ => return None,
        }
    }

    number.is_empty().then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config(key: Option<&str>) -> MapsConfig {
        MapsConfig {
            api_key: key.map(|k| Secret::new(k.to_string())),
            geocoding_url: "http://localhost/geocode".to_string(),
            routes_url: "http://localhost/routes".to_string(),
        }
    }

    #[test]
    fn configured_only_with_key() {
        assert!(MapsClient::new(config(Some("abc"))).is_configured());
        assert!(!MapsClient::new(config(Some(""))).is_configured());
        assert!(!MapsClient::new(config(None)).is_configured());
    }

    #[test]
    fn durations_parse_to_seconds() {
        assert_eq!(parse_duration_secs("1234s"), Some(1234.0));
        assert_eq!(parse_duration_secs("12.5s"), Some(12.5));
        assert_eq!(parse_duration_secs("1h2m3s"), Some(3723.0));
        assert_eq!(parse_duration_secs("0s"), Some(0.0));
        assert_eq!(parse_duration_secs("12"), None);
        assert_eq!(parse_duration_secs("soon"), None);
        assert_eq!(parse_duration_secs(""), None);
    }

    #[test]
    fn waypoints_use_lat_lng_shape() {
        let waypoint = Waypoint::from(LatLng {
            latitude: 36.67,
            longitude: -121.65,
        });
        assert_eq!(
            serde_json::to_value(&waypoint).unwrap(),
            serde_json::json!({"location": {"latLng": {"latitude": 36.67, "longitude": -121.65}}})
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = MapsClient::new(config(None));
        let origin = LatLng {
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(matches!(
            client.compute_route(origin, &[origin]).await,
            Err(MapsError::NotConfigured)
        ));
        assert!(matches!(
            client.geocode("Salinas, CA").await,
            Err(MapsError::NotConfigured)
        ));
    }
}
