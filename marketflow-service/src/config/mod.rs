use service_core::config::{self as core_config, WarehouseConfig};
use service_core::error::AppError;

#[derive(Debug, Clone)]
pub struct MarketFlowConfig {
    pub common: core_config::Config,
    pub warehouse: WarehouseConfig,
}

impl MarketFlowConfig {
    pub fn load() -> Result<Self, AppError> {
        Ok(MarketFlowConfig {
            common: core_config::Config::load()?,
            warehouse: WarehouseConfig::from_env()?,
        })
    }
}
