//! `POST /issue/coldchain` integration tests.

mod common;

use common::TestApp;
use serde_json::{Value, json};
use service_core::warehouse::MockWarehouse;

fn reading(temperature: Value) -> Value {
    json!({
        "shipment_id": "SHIP-100",
        "vehicle_id": "VEH-7",
        "temperature_celsius": temperature,
        "timestamp": "2024-06-01T10:15:00Z"
    })
}

#[tokio::test]
async fn normal_reading_is_recorded() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/issue/coldchain", reading(json!(4.5))).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Cold chain reading reported successfully.");

    let rows = app.warehouse.inserted_rows("cold_chain_readings");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["reading_id"], body["reading_id"]);
    assert_eq!(rows[0]["timestamp"], "2024-06-01T10:15:00+00:00");
    assert_eq!(rows[0]["sensor_id"], "Unknown");
    assert!(rows[0]["location"].is_null());
}

#[tokio::test]
async fn elevated_reading_warns() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/issue/coldchain", reading(json!("9.5"))).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Cold chain reading reported successfully. Warning: Temperature is elevated."
    );
    assert_eq!(
        app.warehouse.inserted_rows("cold_chain_readings")[0]["temperature_celsius"],
        json!(9.5)
    );
}

#[tokio::test]
async fn critical_reading_is_flagged() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/issue/coldchain", reading(json!(18))).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Critical: High temperature excursion reported.");
}

#[tokio::test]
async fn bad_temperature_is_400() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/issue/coldchain", reading(json!("warm"))).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Invalid format for temperature_celsius. Expected number."
    );
}

#[tokio::test]
async fn bad_timestamp_is_400() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/issue/coldchain",
            json!({"shipment_id": "SHIP-100", "temperature_celsius": 5, "timestamp": "noon"}),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Invalid timestamp format. Expected ISO 8601 format."
    );
    assert!(app.warehouse.inserted_rows("cold_chain_readings").is_empty());
}

#[tokio::test]
async fn insert_failure_is_500() {
    let app = TestApp::spawn_with(
        MockWarehouse::new().with_insert_error("cold_chain_readings", "no such field: sensor"),
    )
    .await;

    let response = app.post_json("/issue/coldchain", reading(json!(3))).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Failed to report cold chain reading.");
    assert_eq!(body["details"], "no such field: sensor");
}
