//! `POST /advice/harvest` integration tests.

mod common;

use common::TestApp;
use serde_json::{Value, json};
use service_core::warehouse::{MockWarehouse, ParamValue};

fn scripted() -> MockWarehouse {
    MockWarehouse::new()
        .with_rows(
            "harvest_records",
            vec![json!({"harvest_date": "2024-06-01", "harvested_quantity_kg": 400, "quality_score": 8.1, "quality_notes": ""})],
        )
        .with_rows(
            "farm_qc_issues",
            vec![json!({"issue_date": "2024-05-28", "issue_type": "Pest", "severity": "High", "notes": "aphids"})],
        )
        .with_rows("planting_schedules", vec![])
        .with_rows(
            "farm_profiles",
            vec![json!({"farm_name": "Green Acres", "farm_location": "Salinas, CA", "primary_crops_grown": "Tomato"})],
        )
}

#[tokio::test]
async fn returns_all_sections_on_success() {
    let app = TestApp::spawn_with(scripted()).await;

    let response = app
        .post_json("/advice/harvest", json!({"farm_id": "FARM-001", "product_id": "PROD-TOM"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["farm_details"]["farm_name"], "Green Acres");
    assert_eq!(body["recent_harvests"].as_array().unwrap().len(), 1);
    assert_eq!(body["recent_qc_issues"][0]["issue_type"], "Pest");
    assert_eq!(body["upcoming_schedules"], json!([]));
    assert!(body.get("details").is_none());

    let qc = app.warehouse.last_query_containing("farm_qc_issues").unwrap();
    assert!(qc.sql.contains("(product_id IS NULL OR product_id = @product_id_qc)"));
    assert!(qc.sql.contains("issue_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 90 DAY)"));
}

#[tokio::test]
async fn farm_profile_skipped_without_farm_id() {
    let app = TestApp::spawn_with(scripted()).await;

    let response = app
        .post_json("/advice/harvest", json!({"start_date": "2024-05-01"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["farm_details"], json!({}));
    assert!(app.warehouse.last_query_containing("farm_profiles").is_none());

    let harvest = app.warehouse.last_query_containing("harvest_records").unwrap();
    assert!(harvest.sql.contains("harvest_date >= @start_date"));
    assert_eq!(
        harvest.param("start_date"),
        Some(&ParamValue::Scalar(Some("2024-05-01".to_string())))
    );
}

#[tokio::test]
async fn partial_failure_with_data_is_warning() {
    let app = TestApp::spawn_with(
        MockWarehouse::new()
            .with_query_error("farm_qc_issues", "Access Denied: farm_qc_issues")
            .with_rows(
                "harvest_records",
                vec![json!({"harvest_date": "2024-06-01", "harvested_quantity_kg": 400})],
            ),
    )
    .await;

    let response = app.post_json("/advice/harvest", json!({})).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "warning");
    assert_eq!(body["message"], "Data retrieval issues encountered.");
    assert!(
        body["details"]
            .as_str()
            .unwrap()
            .starts_with("QC query failed: ")
    );
    assert_eq!(body["recent_harvests"].as_array().unwrap().len(), 1);
    assert_eq!(body["recent_qc_issues"], json!([]));
}

#[tokio::test]
async fn total_failure_is_500_with_joined_details() {
    let app = TestApp::spawn_with(
        MockWarehouse::new()
            .with_query_error("harvest_records", "boom-h")
            .with_query_error("farm_qc_issues", "boom-q")
            .with_query_error("planting_schedules", "boom-s")
            .with_query_error("farm_profiles", "boom-f"),
    )
    .await;

    let response = app
        .post_json("/advice/harvest", json!({"farm_id": "FARM-404"}))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Failed to retrieve data for advice.");

    let details = body["details"].as_str().unwrap();
    let parts: Vec<&str> = details.split(" | ").collect();
    assert_eq!(parts.len(), 4);
    assert!(parts[0].starts_with("Harvest query failed:"));
    assert!(parts[3].starts_with("Farm query failed:"));
}

#[tokio::test]
async fn invalid_date_filter_is_400() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/advice/harvest", json!({"end_date": "31/05/2024"}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid end_date format. Expected YYYY-MM-DD.");
}
