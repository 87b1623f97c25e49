//! Case-insensitive substring lookups over the reference tables.
//!
//! The request body is optional. Without a search term the first rows of the
//! table are listed.

use axum::{Json, extract::State};
use serde::Serialize;
use service_core::error::AppError;
use service_core::extract::JsonBody;
use service_core::warehouse::{Query, Row, tables};

use crate::startup::AppState;

const MAX_MATCHES: u32 = 100;

#[derive(Debug, Serialize)]
pub struct Matches {
    pub matches: Vec<Row>,
}

/// One searchable reference table.
struct Directory {
    label: &'static str,
    table: &'static str,
    columns: &'static str,
    /// Body field holding the search term.
    term_field: &'static str,
    /// Columns compared against the search pattern.
    searched: &'static [&'static str],
}

const FARMS: Directory = Directory {
    label: "farm",
    table: tables::FARM_PROFILES,
    columns: "farm_id, farm_name, farm_location, supplier_name",
    term_field: "farm_name",
    searched: &["farm_name", "farm_location"],
};

const PRODUCTS: Directory = Directory {
    label: "product",
    table: tables::PRODUCT_CATALOG,
    columns: "product_id, product_name, category, storage_requirements",
    term_field: "product_name",
    searched: &["product_name"],
};

const CUSTOMERS: Directory = Directory {
    label: "customer",
    table: tables::CUSTOMERS,
    columns: "customer_id, customer_name, customer_type, shipping_address",
    term_field: "customer_name_query",
    searched: &["customer_name"],
};

impl Directory {
    fn query(&self, table: &str, term: Option<&str>) -> Query {
        match term {
            None => Query::new(format!(
                "SELECT {} FROM {} LIMIT {}",
                self.columns, table, MAX_MATCHES
            )),
            Some(term) => {
                let filter = self
                    .searched
                    .iter()
                    .map(|column| format!("LOWER({}) LIKE LOWER(@query_pattern)", column))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                Query::new(format!(
                    "SELECT {} FROM {} WHERE {} LIMIT {}",
                    self.columns, table, filter, MAX_MATCHES
                ))
                .string("query_pattern", format!("%{}%", term))
            }
        }
    }

    async fn lookup(&self, state: &AppState, body: Option<JsonBody>) -> Result<Json<Matches>, AppError> {
        let term = body.and_then(|b| b.non_empty_text(self.term_field));
        match &term {
            Some(term) => tracing::info!(directory = self.label, term = %term, "Looking up"),
            None => tracing::info!(directory = self.label, "No search term, listing initial rows"),
        }

        let query = self.query(&state.warehouse.table(self.table), term.as_deref());
        let matches = state.warehouse.query(&query).await.map_err(|e| {
            AppError::warehouse(
                format!("Internal server error during {} lookup", self.label),
                e,
            )
        })?;

        tracing::info!(directory = self.label, matches = matches.len(), "Returning matches");
        Ok(Json(Matches { matches }))
    }
}

/// `POST /farms/lookup`: farms whose name or location contains `farm_name`.
pub async fn lookup_farms(
    State(state): State<AppState>,
    body: Option<JsonBody>,
) -> Result<Json<Matches>, AppError> {
    FARMS.lookup(&state, body).await
}

/// `POST /products/lookup`: products whose name contains `product_name`.
pub async fn lookup_products(
    State(state): State<AppState>,
    body: Option<JsonBody>,
) -> Result<Json<Matches>, AppError> {
    PRODUCTS.lookup(&state, body).await
}

/// `POST /customers/lookup`: customers whose name contains `customer_name_query`.
pub async fn lookup_customers(
    State(state): State<AppState>,
    body: Option<JsonBody>,
) -> Result<Json<Matches>, AppError> {
    CUSTOMERS.lookup(&state, body).await
}
