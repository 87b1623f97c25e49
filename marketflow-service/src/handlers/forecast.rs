use axum::{Json, extract::State};
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Conditions, Query, Row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct Forecasts {
    pub status: &'static str,
    pub forecasts: Vec<Row>,
}

/// `POST /forecast`: latest forecasts for a product over an exact target window.
pub async fn get_demand_forecast(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Forecasts>, AppError> {
    body.require(&["product_id", "target_date_start", "target_date_end"])?;
    let product_id = body.required_text("product_id")?;
    let start = body.required_date("target_date_start")?;
    let end = body.required_date("target_date_end")?;

    let mut conditions: Conditions = [
        "product_id = @product_id",
        "target_date_start = @start_date",
        "target_date_end = @end_date",
    ]
    .into_iter()
    .collect();
    let mut query = Query::new("")
        .string("product_id", product_id)
        .date("start_date", start)
        .date("end_date", end);

    if let Some(region) = body.non_empty_text("region") {
        conditions.push("region = @region");
        query = query.string("region", region);
    }

    query.sql = format!(
        "SELECT forecast_id, region, forecast_date, target_date_start, target_date_end, \
         forecasted_demand_kg, confidence_level \
         FROM {} {} ORDER BY forecast_date DESC LIMIT 5",
        state.warehouse.table(tables::DEMAND_FORECASTS),
        conditions.to_sql()
    );

    let forecasts = state
        .warehouse
        .query(&query)
        .await
        .map_err(|e| AppError::warehouse("Failed to retrieve demand forecasts.", e))?;

    Ok(Json(Forecasts {
        status: "success",
        forecasts,
    }))
}
