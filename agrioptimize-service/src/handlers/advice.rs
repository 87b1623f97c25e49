use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Conditions, Query, Row, WarehouseError, first_row, tables};

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct HarvestAdvice {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub farm_details: Row,
    pub recent_harvests: Vec<Row>,
    pub recent_qc_issues: Vec<Row>,
    pub upcoming_schedules: Vec<Row>,
}

#[derive(Debug, Default)]
struct AdviceFilters {
    farm_id: Option<String>,
    product_id: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl AdviceFilters {
    fn from_body(body: &JsonBody) -> Result<Self, AppError> {
        Ok(Self {
            farm_id: body.non_empty_text("farm_id"),
            product_id: body.non_empty_text("product_id"),
            start_date: non_empty_date(body, "start_date")?,
            end_date: non_empty_date(body, "end_date")?,
        })
    }
}

fn non_empty_date(body: &JsonBody, key: &str) -> Result<Option<NaiveDate>, AppError> {
    match body.non_empty_text(key) {
        Some(_) => body.required_date(key).map(Some),
        None => Ok(None),
    }
}

/// Bind the date window shared by the harvest and QC queries.
///
/// Both bounds → BETWEEN, one bound → open range, none → the last 90 days.
fn date_window(
    mut query: Query,
    conditions: &mut Conditions,
    column: &str,
    filters: &AdviceFilters,
) -> Query {
    match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) => {
            conditions.push(format!("{} BETWEEN @start_date AND @end_date", column));
            query = query.date("start_date", start).date("end_date", end);
        }
        (Some(start), None) => {
            conditions.push(format!("{} >= @start_date", column));
            query = query.date("start_date", start);
        }
        (None, Some(end)) => {
            conditions.push(format!("{} <= @end_date", column));
            query = query.date("end_date", end);
        }
        (None, None) => {
            conditions.push(format!(
                "{} >= DATE_SUB(CURRENT_DATE(), INTERVAL 90 DAY)",
                column
            ));
        }
    }
    query
}

fn harvest_query(table: &str, filters: &AdviceFilters) -> Query {
    let mut conditions = Conditions::new();
    let mut query = Query::new("");

    if let Some(farm_id) = &filters.farm_id {
        conditions.push("farm_id = @farm_id_h");
        query = query.string("farm_id_h", farm_id.as_str());
    }
    if let Some(product_id) = &filters.product_id {
        conditions.push("product_id = @product_id_h");
        query = query.string("product_id_h", product_id.as_str());
    }
    query = date_window(query, &mut conditions, "harvest_date", filters);

    query.sql = format!(
        "SELECT harvest_date, harvested_quantity_kg, quality_score, quality_notes \
         FROM {} {} ORDER BY harvest_date DESC LIMIT 5",
        table,
        conditions.to_sql()
    );
    query
}

fn qc_query(table: &str, filters: &AdviceFilters) -> Query {
    let mut conditions = Conditions::new();
    let mut query = Query::new("");

    if let Some(farm_id) = &filters.farm_id {
        conditions.push("farm_id = @farm_id_qc");
        query = query.string("farm_id_qc", farm_id.as_str());
    }
    if let Some(product_id) = &filters.product_id {
        // Farm-wide issues carry no product.
        conditions.push("(product_id IS NULL OR product_id = @product_id_qc)");
        query = query.string("product_id_qc", product_id.as_str());
    }
    query = date_window(query, &mut conditions, "issue_date", filters);

    query.sql = format!(
        "SELECT issue_date, issue_type, severity, notes \
         FROM {} {} ORDER BY issue_date DESC LIMIT 5",
        table,
        conditions.to_sql()
    );
    query
}

fn schedule_query(table: &str, filters: &AdviceFilters) -> Query {
    let mut conditions = Conditions::new();
    conditions.push("planned_harvest_date_estimate >= CURRENT_DATE()");
    let mut query = Query::new("");

    if let Some(farm_id) = &filters.farm_id {
        conditions.push("farm_id = @farm_id_sched");
        query = query.string("farm_id_sched", farm_id.as_str());
    }
    if let Some(product_id) = &filters.product_id {
        conditions.push("product_id = @product_id_sched");
        query = query.string("product_id_sched", product_id.as_str());
    }

    query.sql = format!(
        "SELECT planned_planting_date, planned_harvest_date_estimate, \
         expected_yield_estimate_kg, status \
         FROM {} {} ORDER BY planned_planting_date ASC LIMIT 5",
        table,
        conditions.to_sql()
    );
    query
}

/// `POST /advice/harvest`: recent harvests, QC issues, upcoming schedules and
/// the farm profile, gathered for an agent to reason over.
///
/// Individual query failures do not abort the request. If anything was found
/// the partial data is returned as a 200 `warning`, otherwise as a 500 `error`.
pub async fn get_harvest_advice(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<(StatusCode, Json<HarvestAdvice>), AppError> {
    let filters = AdviceFilters::from_body(&body)?;
    let warehouse = &state.warehouse;
    let mut failures: Vec<String> = Vec::new();

    let mut collect = |label: &str, result: Result<Vec<Row>, WarehouseError>| match result {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "{} query failed", label);
            failures.push(format!("{} query failed: {}", label, e));
            Vec::new()
        }
    };

    let recent_harvests = collect(
        "Harvest",
        warehouse
            .query(&harvest_query(&warehouse.table(tables::HARVEST_RECORDS), &filters))
            .await,
    );
    let recent_qc_issues = collect(
        "QC",
        warehouse
            .query(&qc_query(&warehouse.table(tables::FARM_QC_ISSUES), &filters))
            .await,
    );
    let upcoming_schedules = collect(
        "Schedule",
        warehouse
            .query(&schedule_query(
                &warehouse.table(tables::PLANTING_SCHEDULES),
                &filters,
            ))
            .await,
    );

    let farm_details = match &filters.farm_id {
        Some(farm_id) => {
            let query = Query::new(format!(
                "SELECT farm_name, farm_location, primary_crops_grown \
                 FROM {} WHERE farm_id = @farm_id_f LIMIT 1",
                warehouse.table(tables::FARM_PROFILES)
            ))
            .string("farm_id_f", farm_id.as_str());
            first_row(collect("Farm", warehouse.query(&query).await)).unwrap_or_default()
        }
        None => Row::new(),
    };

    let mut advice = HarvestAdvice {
        status: "success",
        message: None,
        details: None,
        farm_details,
        recent_harvests,
        recent_qc_issues,
        upcoming_schedules,
    };

    if failures.is_empty() {
        return Ok((StatusCode::OK, Json(advice)));
    }

    let found_any = !advice.recent_harvests.is_empty()
        || !advice.recent_qc_issues.is_empty()
        || !advice.upcoming_schedules.is_empty()
        || !advice.farm_details.is_empty();

    advice.details = Some(failures.join(" | "));
    let status = if found_any {
        advice.status = "warning";
        advice.message = Some("Data retrieval issues encountered.");
        StatusCode::OK
    } else {
        advice.status = "error";
        advice.message = Some("Failed to retrieve data for advice.");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(advice)))
}
