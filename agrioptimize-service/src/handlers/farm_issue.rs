use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{row, tables};
use uuid::Uuid;

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct IssueReported {
    pub status: &'static str,
    pub issue_id: String,
    pub message: &'static str,
}

/// `POST /issue/farm`: report a quality problem observed at a farm.
pub async fn report_farm_issue(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<IssueReported>, AppError> {
    body.require(&["farm_id", "issue_type"])?;

    let issue_date = body
        .optional_date("issue_date")?
        .unwrap_or_else(|| Utc::now().date_naive());
    let affected_quantity_kg = body.optional_int("affected_quantity_kg")?;

    let issue_id = Uuid::new_v4().to_string();
    let record = row(json!({
        "issue_id": issue_id,
        "farm_id": body.value("farm_id"),
        "product_id": body.value("product_id"),
        "issue_date": issue_date.to_string(),
        "issue_type": body.value("issue_type"),
        "affected_quantity_kg": affected_quantity_kg,
        "severity": body.value_or("severity", "Medium"),
        "reported_by": body.value_or("reported_by", "AI Agent"),
        "notes": body.value_or("notes", ""),
        "photos_gcs_path": body.value("photos_gcs_path"),
    }));

    state
        .warehouse
        .insert_rows(tables::FARM_QC_ISSUES, &[record])
        .await
        .map_err(|e| AppError::warehouse("Failed to report quality issue.", e))?;

    tracing::info!(issue_id = %issue_id, "Farm quality issue reported");

    Ok(Json(IssueReported {
        status: "success",
        issue_id,
        message: "Farm quality issue reported successfully.",
    }))
}
