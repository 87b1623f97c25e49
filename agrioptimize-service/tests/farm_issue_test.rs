//! `POST /issue/farm` integration tests.

mod common;

use chrono::Utc;
use common::TestApp;
use serde_json::{Value, json};

#[tokio::test]
async fn applies_defaults() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/issue/farm", json!({"farm_id": "FARM-001", "issue_type": "Frost damage"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Farm quality issue reported successfully.");

    let rows = app.warehouse.inserted_rows("farm_qc_issues");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["issue_id"], body["issue_id"]);
    assert_eq!(row["severity"], "Medium");
    assert_eq!(row["reported_by"], "AI Agent");
    assert_eq!(row["notes"], "");
    assert_eq!(
        row["issue_date"],
        json!(Utc::now().date_naive().format("%Y-%m-%d").to_string())
    );
    assert!(row["affected_quantity_kg"].is_null());
}

#[tokio::test]
async fn keeps_supplied_values() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/issue/farm",
            json!({
                "farm_id": "FARM-001",
                "issue_type": "Bruising",
                "issue_date": "2024-06-02",
                "severity": "High",
                "affected_quantity_kg": "35",
                "product_id": "PROD-PEACH"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let row = &app.warehouse.inserted_rows("farm_qc_issues")[0];
    assert_eq!(row["issue_date"], "2024-06-02");
    assert_eq!(row["severity"], "High");
    assert_eq!(row["affected_quantity_kg"], json!(35));
    assert_eq!(row["product_id"], "PROD-PEACH");
}

#[tokio::test]
async fn rejects_bad_issue_date() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/issue/farm",
            json!({"farm_id": "FARM-001", "issue_type": "Pest", "issue_date": "yesterday"}),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid issue_date format. Expected YYYY-MM-DD.");
}

#[tokio::test]
async fn missing_issue_type_is_400() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/issue/farm", json!({"farm_id": "FARM-001"})).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Missing required fields in body: issue_type");
}
