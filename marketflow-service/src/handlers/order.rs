use axum::{Json, extract::State};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};
use service_core::error::AppError;
use service_core::extract::{JsonBody, as_text, round2, to_int};
use service_core::warehouse::{Query, Row, first_row, row, tables};
use uuid::Uuid;

use crate::startup::AppState;

const UNKNOWN_ADDRESS: &str = "Unknown Address";

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub status: &'static str,
    pub order_id: String,
    pub message: &'static str,
    pub total_amount: f64,
}

/// A validated order line before pricing.
#[derive(Debug, Clone, PartialEq)]
struct OrderLine {
    product_id: Value,
    quantity_kg: i64,
}

fn parse_lines(items: &[Value]) -> Result<Vec<OrderLine>, AppError> {
    items
        .iter()
        .map(|item| {
            let product_id = item.get("product_id").filter(|v| !v.is_null());
            let quantity = item.get("quantity_kg").filter(|v| !v.is_null());
            let (Some(product_id), Some(quantity)) = (product_id, quantity) else {
                return Err(AppError::bad_request(
                    "Each item in 'items' must have 'product_id' and 'quantity_kg'.",
                ));
            };

            let label = as_text(product_id).unwrap_or_else(|| product_id.to_string());
            let quantity_kg = to_int(quantity).ok_or_else(|| {
                AppError::bad_request(format!(
                    "Invalid quantity_kg format for product {}. Expected integer.",
                    label
                ))
            })?;
            if quantity_kg <= 0 {
                return Err(AppError::bad_request(format!(
                    "Invalid quantity for product {}. Must be positive integer.",
                    label
                )));
            }

            Ok(OrderLine {
                product_id: product_id.clone(),
                quantity_kg,
            })
        })
        .collect()
}

/// Price each line at a simulated per-kg rate. Returns the item rows and the order total.
fn price_lines<R: Rng + ?Sized>(rng: &mut R, order_id: &str, lines: Vec<OrderLine>) -> (Vec<Row>, f64) {
    let mut total = 0.0;
    let rows = lines
        .into_iter()
        .map(|line| {
            let price_per_kg = round2(rng.gen_range(1.0..=5.0));
            let line_total = round2(line.quantity_kg as f64 * price_per_kg);
            total += line_total;
            row(json!({
                "order_item_id": Uuid::new_v4().to_string(),
                "order_id": order_id,
                "product_id": line.product_id,
                "ordered_quantity_kg": line.quantity_kg,
                "price_per_kg_at_order": price_per_kg,
                "line_item_total": line_total,
            }))
        })
        .collect();
    (rows, round2(total))
}

/// `POST /order`: record a purchase order and its lines.
///
/// The order row is written before the item rows. A failed item insert does
/// not remove the order row.
pub async fn place_purchase_order(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<OrderPlaced>, AppError> {
    body.require(&["customer_id", "items"])?;
    let lines = parse_lines(body.non_empty_list("items")?)?;
    let customer_id = body.required_text("customer_id")?;
    let order_date = Utc::now().date_naive();
    let delivery_date = body
        .optional_date("delivery_date_requested")?
        .unwrap_or(order_date);

    let order_id = Uuid::new_v4().to_string();
    let (item_rows, total_amount) = price_lines(&mut rand::thread_rng(), &order_id, lines);

    let delivery_address = match body.get("delivery_address") {
        Some(address) => address.clone(),
        None => customer_address(&state, &customer_id).await,
    };

    let order = row(json!({
        "order_id": order_id,
        "customer_id": body.value("customer_id"),
        "order_date": order_date.format("%Y-%m-%d").to_string(),
        "delivery_date_requested": delivery_date.format("%Y-%m-%d").to_string(),
        "delivery_address": delivery_address,
        "status": body.value_or("status", "Pending"),
        "total_amount": total_amount,
    }));

    let mut failures = Vec::new();
    if let Err(e) = state.warehouse.insert_rows(tables::ORDERS, &[order]).await {
        failures.push(format!("Order insert failed: {}", e));
    }
    if let Err(e) = state.warehouse.insert_rows(tables::ORDER_ITEMS, &item_rows).await {
        failures.push(format!("Order items insert failed: {}", e));
    }
    if !failures.is_empty() {
        return Err(AppError::failure(
            "Failed to place purchase order.",
            failures.join(" | "),
        ));
    }

    metrics::counter!("orders_placed_total").increment(1);
    tracing::info!(
        order_id = %order_id,
        customer_id = %customer_id,
        lines = item_rows.len(),
        total_amount,
        "Purchase order placed"
    );

    Ok(Json(OrderPlaced {
        status: "success",
        order_id,
        message: "Purchase order placed successfully.",
        total_amount,
    }))
}

/// Customer's shipping address, or a placeholder when the lookup fails or finds nothing.
async fn customer_address(state: &AppState, customer_id: &str) -> Value {
    let query = Query::new(format!(
        "SELECT shipping_address FROM {} WHERE customer_id = @customer_id LIMIT 1",
        state.warehouse.table(tables::CUSTOMERS)
    ))
    .string("customer_id", customer_id);

    match state.warehouse.query(&query).await {
        Ok(rows) => first_row(rows)
            .and_then(|mut r| r.remove("shipping_address"))
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::from(UNKNOWN_ADDRESS)),
        Err(e) => {
            tracing::warn!(
                customer_id = %customer_id,
                error = %e,
                "Could not fetch customer shipping address"
            );
            Value::from(UNKNOWN_ADDRESS)
        }
    }
}
