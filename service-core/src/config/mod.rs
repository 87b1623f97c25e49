use crate::error::AppError;
use config::{Config as Cfg, File};
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint. Traces are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            // Cloud Run and Cloud Functions hand the listening port over in PORT.
            .set_override_option("port", env::var("PORT").ok())?
            .set_override_option("otlp_endpoint", env::var("OTLP_ENDPOINT").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Connection settings for the analytical warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_base_url: String,
    pub location: Option<String>,
    /// Static bearer token. When absent the metadata server is asked for one.
    pub access_token: Option<Secret<String>>,
    pub metadata_host: String,
    pub query_timeout: Duration,
}

impl WarehouseConfig {
    pub const DEFAULT_API_BASE_URL: &'static str = "https://bigquery.googleapis.com/bigquery/v2";
    pub const DEFAULT_METADATA_HOST: &'static str = "http://metadata.google.internal";

    pub fn from_env() -> Result<Self, AppError> {
        let timeout_secs = get_env("BQ_QUERY_TIMEOUT_SECS", Some("30"))?
            .parse::<u64>()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("BQ_QUERY_TIMEOUT_SECS is invalid: {}", e))
            })?;

        Ok(Self {
            project_id: get_env("GCP_PROJECT", None)?,
            dataset: get_env("BQ_DATASET", None)?,
            api_base_url: get_env("BQ_API_BASE_URL", Some(Self::DEFAULT_API_BASE_URL))?,
            location: env::var("BQ_LOCATION").ok().filter(|v| !v.is_empty()),
            access_token: env::var("BQ_ACCESS_TOKEN")
                .ok()
                .filter(|v| !v.is_empty())
                .map(Secret::new),
            metadata_host: get_env("GCE_METADATA_HOST", Some(Self::DEFAULT_METADATA_HOST))?,
            query_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Read an environment variable, falling back to `default` when given.
pub fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => default.map(str::to_string).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
        }),
    }
}
