//! `POST /inventory/available` integration tests.

mod common;

use common::TestApp;
use serde_json::{Value, json};
use service_core::warehouse::MockWarehouse;

#[tokio::test]
async fn sums_all_sources() {
    let app = TestApp::spawn_with(
        MockWarehouse::new()
            .with_rows("total_on_hand", vec![json!({"total_on_hand": 840.5, "num_locations": 2})])
            .with_rows("total_incoming_shipments", vec![json!({"total_incoming_shipments": 300})])
            .with_rows("total_upcoming_harvest", vec![json!({"total_upcoming_harvest": null})]),
    )
    .await;

    let response = app
        .post_json("/inventory/available", json!({"product_id": "PROD-TOM", "location_id": "WH-01"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["product_id"], "PROD-TOM");
    assert_eq!(body["location_id"], "WH-01");
    assert_eq!(body["total_on_hand_kg"], 840.5);
    assert_eq!(body["num_stock_locations"], 2);
    assert_eq!(body["total_incoming_shipments_kg"], 300);
    assert_eq!(body["total_upcoming_harvest_kg"], 0);
}

#[tokio::test]
async fn empty_results_are_zero() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/inventory/available", json!({"product_id": "PROD-TOM"}))
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_on_hand_kg"], 0);
    assert!(body["location_id"].is_null());
}

#[tokio::test]
async fn any_failure_is_500_with_joined_details() {
    let app = TestApp::spawn_with(
        MockWarehouse::new()
            .with_query_error("total_incoming_shipments", "shipments unavailable")
            .with_query_error("total_upcoming_harvest", "schedules unavailable"),
    )
    .await;

    let response = app
        .post_json("/inventory/available", json!({"product_id": "PROD-TOM"}))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Failed to retrieve availability data.");
    let details = body["details"].as_str().unwrap();
    assert!(details.starts_with("Shipment query failed:"));
    assert!(details.contains(" | Schedule query failed:"));
}
