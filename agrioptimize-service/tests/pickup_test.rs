//! `POST /schedule/pickup` integration tests.

mod common;

use common::TestApp;
use serde_json::{Value, json};
use service_core::warehouse::{MockWarehouse, ParamValue};

fn request(quantity: Value) -> Value {
    json!({
        "farm_id": "FARM-001",
        "product_id": "PROD-TOM",
        "quantity_kg": quantity,
        "requested_date": "2024-06-10"
    })
}

#[tokio::test]
async fn acknowledges_when_enough_was_harvested() {
    let app = TestApp::spawn_with(
        MockWarehouse::new().with_rows("SUM(harvested_quantity_kg)", vec![json!({"total_harvested": 900})]),
    )
    .await;

    let response = app.post_json("/schedule/pickup", request(json!(500))).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["details"]["request_status"], "Acknowledged");
    assert_eq!(body["details"]["confirmed_quantity_kg"], 500);
    assert!(body["details"]["requires_cold_chain"].is_boolean());

    let pickup = body["details"]["estimated_pickup_datetime"].as_str().unwrap();
    assert!(pickup >= "2024-06-10T08:00:00" && pickup <= "2024-06-12T16:59:00");

    let query = app.warehouse.last_query_containing("SUM(harvested_quantity_kg)").unwrap();
    assert!(query.sql.contains("DATE_SUB(@requested_date, INTERVAL 7 DAY)"));
    assert_eq!(
        query.param("requested_date"),
        Some(&ParamValue::Scalar(Some("2024-06-10".to_string())))
    );
}

#[tokio::test]
async fn reports_unavailable_when_sum_is_null() {
    let app = TestApp::spawn_with(
        MockWarehouse::new().with_rows("SUM(harvested_quantity_kg)", vec![json!({"total_harvested": null})]),
    )
    .await;

    let response = app.post_json("/schedule/pickup", request(json!("120"))).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unavailable");
    assert_eq!(
        body["message"],
        "Unable to schedule pickup for 120 kg. Only found approximately 0 kg recently harvested or on hand for this product at this farm. Please adjust quantity or date."
    );
}

#[tokio::test]
async fn availability_query_failure_is_500() {
    let app = TestApp::spawn_with(
        MockWarehouse::new().with_query_error("SUM(harvested_quantity_kg)", "quota exceeded"),
    )
    .await;

    let response = app.post_json("/schedule/pickup", request(json!(10))).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Failed to check farm availability.");
    assert!(body["details"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn rejects_fractional_quantity_string() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/schedule/pickup", request(json!("12.5"))).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid format for quantity_kg. Expected integer.");
}
