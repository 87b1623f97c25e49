use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{Query, Row, Warehouse, WarehouseError};

enum Canned {
    Rows(Vec<Row>),
    Error(String),
}

/// In-memory warehouse for tests.
///
/// Query responses are keyed by a SQL fragment: the first registered fragment
/// contained in the executed SQL decides the result. Unmatched queries return
/// no rows. Executed queries and inserted rows are recorded for assertions.
#[derive(Default)]
pub struct MockWarehouse {
    project: String,
    dataset: String,
    responses: Vec<(String, Canned)>,
    insert_failures: HashMap<String, String>,
    unhealthy: bool,
    executed: Mutex<Vec<Query>>,
    inserted: Mutex<HashMap<String, Vec<Row>>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            project: "test-project".to_string(),
            dataset: "test_dataset".to_string(),
            ..Default::default()
        }
    }

    /// Answer queries containing `fragment` with these rows. Non-object rows are skipped.
    pub fn with_rows(mut self, fragment: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.responses.push((fragment.to_string(), Canned::Rows(rows)));
        self
    }

    pub fn with_query_error(mut self, fragment: &str, message: &str) -> Self {
        self.responses
            .push((fragment.to_string(), Canned::Error(message.to_string())));
        self
    }

    pub fn with_insert_error(mut self, table: &str, message: &str) -> Self {
        self.insert_failures
            .insert(table.to_string(), message.to_string());
        self
    }

    /// Fail the `SELECT 1` health probe.
    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    pub fn executed_queries(&self) -> Vec<Query> {
        self.executed
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    /// Last executed query whose SQL contains `fragment`.
    pub fn last_query_containing(&self, fragment: &str) -> Option<Query> {
        self.executed_queries()
            .into_iter()
            .rev()
            .find(|q| q.sql.contains(fragment))
    }

    pub fn inserted_rows(&self, table: &str) -> Vec<Row> {
        self.inserted
            .lock()
            .ok()
            .and_then(|rows| rows.get(table).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    fn table(&self, name: &str) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, name)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, WarehouseError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(query.clone());
        }

        if self.unhealthy && query.sql.trim() == "SELECT 1" {
            return Err(WarehouseError::Api {
                status: 503,
                message: "warehouse unavailable".to_string(),
            });
        }

        match self
            .responses
            .iter()
            .find(|(fragment, _)| query.sql.contains(fragment.as_str()))
        {
            Some((_, Canned::Rows(rows))) => Ok(rows.clone()),
            Some((_, Canned::Error(message))) => Err(WarehouseError::Api {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError> {
        if let Some(message) = self.insert_failures.get(table) {
            return Err(WarehouseError::Insert(message.clone()));
        }

        if let Ok(mut inserted) = self.inserted.lock() {
            inserted
                .entry(table.to_string())
                .or_default()
                .extend(rows.iter().cloned());
        }
        Ok(())
    }
}
