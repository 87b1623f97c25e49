use secrecy::Secret;
use service_core::config::{self as core_config, WarehouseConfig, get_env};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub common: core_config::Config,
    pub warehouse: WarehouseConfig,
    pub maps: MapsConfig,
}

/// Google Maps Platform endpoints and credentials.
#[derive(Debug, Clone)]
pub struct MapsConfig {
    /// Without a key the service still starts; every Maps call fails.
    pub api_key: Option<Secret<String>>,
    pub geocoding_url: String,
    pub routes_url: String,
}

impl MapsConfig {
    pub const DEFAULT_GEOCODING_URL: &'static str = "https://maps.googleapis.com/maps/api/geocode/json";
    pub const DEFAULT_ROUTES_URL: &'static str =
        "https://routes.googleapis.com/directions/v2:computeRoutes";

    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(Secret::new),
            geocoding_url: get_env("GEOCODING_API_URL", Some(Self::DEFAULT_GEOCODING_URL))?,
            routes_url: get_env("ROUTES_API_URL", Some(Self::DEFAULT_ROUTES_URL))?,
        })
    }
}

impl RoutingConfig {
    pub fn load() -> Result<Self, AppError> {
        Ok(RoutingConfig {
            common: core_config::Config::load()?,
            warehouse: WarehouseConfig::from_env()?,
            maps: MapsConfig::from_env()?,
        })
    }
}
