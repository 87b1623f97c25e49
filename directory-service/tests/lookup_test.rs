//! Directory lookup integration tests.

mod common;

use common::TestApp;
use serde_json::{Value, json};
use service_core::warehouse::{MockWarehouse, ParamValue};

#[tokio::test]
async fn farm_lookup_matches_name_or_location() {
    let app = TestApp::spawn_with(MockWarehouse::new().with_rows(
        "farm_profiles",
        vec![json!({"farm_id": "FARM-001", "farm_name": "Green Acres", "farm_location": "Salinas, CA", "supplier_name": "GA Co-op"})],
    ))
    .await;

    let response = app.post_json("/farms/lookup", json!({"farm_name": "salinas"})).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["matches"][0]["farm_id"], "FARM-001");
    assert!(body.get("status").is_none());

    let query = app.warehouse.last_query_containing("farm_profiles").unwrap();
    assert!(query.sql.contains("LOWER(farm_location) LIKE LOWER(@query_pattern)"));
    assert_eq!(
        query.param("query_pattern"),
        Some(&ParamValue::Scalar(Some("%salinas%".to_string())))
    );
}

#[tokio::test]
async fn empty_term_lists_rows() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/products/lookup", json!({"product_name": ""})).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["matches"], json!([]));

    let query = app.warehouse.last_query_containing("product_catalog").unwrap();
    assert!(!query.sql.contains("WHERE"));
    assert!(query.sql.ends_with("LIMIT 100"));
}

#[tokio::test]
async fn customer_lookup_works_without_body() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/customers/lookup", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["matches"], json!([]));
    assert!(app.warehouse.last_query_containing("customers").is_some());
}

#[tokio::test]
async fn lookup_failure_is_500() {
    let app = TestApp::spawn_with(MockWarehouse::new().with_query_error("customers", "denied")).await;

    let response = app
        .post_json("/customers/lookup", json!({"customer_name_query": "fresh"}))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Internal server error during customer lookup");
    assert!(body["details"].as_str().unwrap().contains("denied"));
}

#[tokio::test]
async fn vehicle_lookup_returns_single_match() {
    let app = TestApp::spawn_with(MockWarehouse::new().with_rows(
        "vehicles",
        vec![json!({"vehicle_id": "VEH-7", "vehicle_license_no": "ABC-123", "capacity_kg": 2000})],
    ))
    .await;

    let response = app
        .post_json("/vehicles/lookup", json!({"vehicle_license_no": "ABC-123"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);
    assert_eq!(body["matches"][0]["vehicle_id"], "VEH-7");
}

#[tokio::test]
async fn unknown_vehicle_is_404_with_empty_matches() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/vehicles/lookup", json!({"vehicle_license_no": "ZZZ-999"}))
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "not_found");
    assert_eq!(body["message"], "Vehicle with license 'ZZZ-999' not found");
    assert_eq!(body["matches"], json!([]));
}

#[tokio::test]
async fn vehicle_lookup_requires_license() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/vehicles/lookup", json!({"vehicle_license_no": ""}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Missing or empty vehicle_license_no in request body"
    );
}

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], "directory-service");
}
