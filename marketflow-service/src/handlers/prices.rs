use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Conditions, Query, Row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct MarketPrices {
    pub status: &'static str,
    pub prices: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /prices/current`: market price for a product on one day (today by default).
pub async fn get_market_prices(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<MarketPrices>, AppError> {
    body.require(&["product_id"])?;
    let product_id = body.required_text("product_id")?;
    let market_date = body
        .optional_date("date")?
        .unwrap_or_else(|| Utc::now().date_naive());
    let region = body.non_empty_text("region");

    let mut conditions: Conditions = ["product_id = @product_id", "market_date = @market_date"]
        .into_iter()
        .collect();
    let mut query = Query::new("")
        .string("product_id", product_id.as_str())
        .date("market_date", market_date);

    if let Some(region) = &region {
        conditions.push("region = @region");
        query = query.string("region", region.as_str());
    }

    query.sql = format!(
        "SELECT price_record_id, region, market_date, average_market_price_per_kg, source \
         FROM {} {} LIMIT 1",
        state.warehouse.table(tables::MARKET_PRICES),
        conditions.to_sql()
    );

    let prices = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Failed to retrieve market prices.", e))?;

    let message = prices.is_empty().then(|| {
        let in_region = region.map(|r| format!(" in {}", r)).unwrap_or_default();
        format!(
            "No market price found for {} on {}{}.",
            product_id,
            market_date.format("%Y-%m-%d"),
            in_region
        )
    });

    Ok(Json(MarketPrices {
        status: "success",
        prices,
        message,
    }))
}
