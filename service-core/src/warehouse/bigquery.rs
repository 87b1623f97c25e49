use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{ParamValue, Query, QueryParameter, Row, TokenSource, Warehouse, WarehouseError};
use crate::config::WarehouseConfig;
use crate::observability::TracedClientExt;

/// Upper bound for a single jobs.query / getQueryResults wait.
const MAX_POLL_WAIT: Duration = Duration::from_secs(10);

/// BigQuery client over the v2 REST API.
pub struct BigQueryClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    dataset: String,
    location: Option<String>,
    query_timeout: Duration,
    tokens: TokenSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<Value>,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    mode: Option<String>,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

impl BigQueryClient {
    pub fn new(config: &WarehouseConfig) -> Self {
        let client = reqwest::Client::new();
        let tokens = TokenSource::new(
            client.clone(),
            config.access_token.clone(),
            &config.metadata_host,
        );

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            dataset: config.dataset.clone(),
            location: config.location.clone(),
            query_timeout: config.query_timeout,
            tokens,
        }
    }

    fn project_url(&self) -> String {
        format!("{}/projects/{}", self.base_url, self.project_id)
    }

    async fn start_query(&self, query: &Query) -> Result<QueryResponse, WarehouseError> {
        let token = self.tokens.token().await?;
        let request = QueryRequest {
            query: &query.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query.params.iter().map(encode_parameter).collect(),
            timeout_ms: self.query_timeout.min(MAX_POLL_WAIT).as_millis() as u64,
            location: self.location.as_deref(),
        };

        let response = self
            .client
            .traced_post(&format!("{}/queries", self.project_url()))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        parse_response(response).await
    }

    async fn fetch_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
        wait: Duration,
    ) -> Result<QueryResponse, WarehouseError> {
        let token = self.tokens.token().await?;
        let mut params: Vec<(&str, String)> =
            vec![("timeoutMs", (wait.as_millis() as u64).to_string())];
        if let Some(location) = job.location.as_deref().or(self.location.as_deref()) {
            params.push(("location", location.to_string()));
        }
        if let Some(page) = page_token {
            params.push(("pageToken", page.to_string()));
        }

        let response = self
            .client
            .traced_get(&format!("{}/queries/{}", self.project_url(), job.job_id))
            .query(&params)
            .bearer_auth(token)
            .send()
            .await?;

        parse_response(response).await
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    fn table(&self, name: &str) -> String {
        format!("`{}.{}.{}`", self.project_id, self.dataset, name)
    }

    #[tracing::instrument(skip(self, query), fields(params = query.params.len()))]
    async fn query(&self, query: &Query) -> Result<Vec<Row>, WarehouseError> {
        let deadline = Instant::now() + self.query_timeout;
        let mut page = self.start_query(query).await?;

        while !page.job_complete {
            let job = page
                .job_reference
                .clone()
                .ok_or_else(|| WarehouseError::Decode("incomplete job without jobReference".into()))?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WarehouseError::Timeout(self.query_timeout.as_secs()));
            }
            tracing::debug!(job_id = %job.job_id, "Waiting for query job to complete");
            page = self
                .fetch_results(&job, None, remaining.min(MAX_POLL_WAIT))
                .await?;
        }

        let schema = page.schema.clone().unwrap_or(TableSchema { fields: Vec::new() });
        let mut rows = decode_rows(&schema.fields, std::mem::take(&mut page.rows))?;

        while let Some(token) = page.page_token.take() {
            let job = page
                .job_reference
                .clone()
                .ok_or_else(|| WarehouseError::Decode("paged result without jobReference".into()))?;
            page = self.fetch_results(&job, Some(&token), MAX_POLL_WAIT).await?;
            rows.extend(decode_rows(&schema.fields, std::mem::take(&mut page.rows))?);
        }

        tracing::debug!(rows = rows.len(), "Query completed");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError> {
        let token = self.tokens.token().await?;
        let url = format!(
            "{}/datasets/{}/tables/{}/insertAll",
            self.project_url(),
            self.dataset,
            table
        );
        let payload = json!({
            "rows": rows
                .iter()
                .map(|row| json!({ "insertId": Uuid::new_v4().to_string(), "json": row }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .traced_post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WarehouseError::TableNotFound(format!(
                "{}.{}.{}",
                self.project_id, self.dataset, table
            )));
        }

        let result: InsertAllResponse = parse_response(response).await?;
        if let Some(message) = result
            .insert_errors
            .iter()
            .flat_map(|e| e.errors.iter())
            .map(|e| e.message.clone())
            .next()
        {
            return Err(WarehouseError::Insert(message));
        }
        if !result.insert_errors.is_empty() {
            return Err(WarehouseError::Insert("row rejected by BigQuery".to_string()));
        }

        Ok(())
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, WarehouseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(WarehouseError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| WarehouseError::Decode(e.to_string()))
}

fn encode_parameter(param: &QueryParameter) -> Value {
    let kind = param.kind.as_str();
    match &param.value {
        ParamValue::Scalar(value) => json!({
            "name": param.name,
            "parameterType": { "type": kind },
            "parameterValue": { "value": value },
        }),
        ParamValue::Array(values) => json!({
            "name": param.name,
            "parameterType": { "type": "ARRAY", "arrayType": { "type": kind } },
            "parameterValue": {
                "arrayValues": values.iter().map(|v| json!({ "value": v })).collect::<Vec<_>>(),
            },
        }),
    }
}

fn decode_rows(fields: &[FieldSchema], rows: Vec<TableRow>) -> Result<Vec<Row>, WarehouseError> {
    rows.into_iter()
        .map(|row| decode_record(fields, row.f))
        .collect()
}

fn decode_record(fields: &[FieldSchema], cells: Vec<TableCell>) -> Result<Row, WarehouseError> {
    if cells.len() != fields.len() {
        return Err(WarehouseError::Decode(format!(
            "row has {} cells but schema has {} fields",
            cells.len(),
            fields.len()
        )));
    }

    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| Ok((field.name.clone(), decode_field(field, cell.v)?)))
        .collect()
}

fn decode_field(field: &FieldSchema, value: Value) -> Result<Value, WarehouseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    if field.mode.as_deref() == Some("REPEATED") {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(WarehouseError::Decode(format!(
                    "expected array for repeated field {}, got {}",
                    field.name, other
                )));
            }
        };
        return items
            .into_iter()
            .map(|item| {
                let inner = item.get("v").cloned().unwrap_or(Value::Null);
                decode_scalar(field, inner)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }

    decode_scalar(field, value)
}

fn decode_scalar(field: &FieldSchema, value: Value) -> Result<Value, WarehouseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match field.kind.as_str() {
        "RECORD" | "STRUCT" => {
            let cells: Vec<TableCell> = value
                .get("f")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| WarehouseError::Decode(e.to_string()))?
                .unwrap_or_default();
            decode_record(&field.fields, cells).map(Value::Object)
        }
        "INTEGER" | "INT64" => {
            let text = cell_text(&value);
            text.parse::<i64>()
                .map(Value::from)
                .map_err(|_| bad_cell(field, &text))
        }
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            let text = cell_text(&value);
            text.parse::<f64>()
                .map(Value::from)
                .map_err(|_| bad_cell(field, &text))
        }
        "BOOLEAN" | "BOOL" => Ok(Value::Bool(cell_text(&value).eq_ignore_ascii_case("true"))),
        "TIMESTAMP" => {
            let text = cell_text(&value);
            let seconds = text.parse::<f64>().map_err(|_| bad_cell(field, &text))?;
            let micros = (seconds * 1_000_000.0).round() as i64;
            DateTime::<Utc>::from_timestamp_micros(micros)
                .map(|ts| Value::String(ts.to_rfc3339()))
                .ok_or_else(|| bad_cell(field, &text))
        }
        _ => Ok(Value::String(cell_text(&value))),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bad_cell(field: &FieldSchema, text: &str) -> WarehouseError {
    WarehouseError::Decode(format!(
        "cannot decode {} value '{}' for column {}",
        field.kind, text, field.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::ParamType;

    fn field(name: &str, kind: &str) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            kind: kind.to_string(),
            mode: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn encodes_scalar_and_array_parameters() {
        let scalar = QueryParameter {
            name: "farm_id".into(),
            kind: ParamType::String,
            value: ParamValue::Scalar(Some("F-1".into())),
        };
        assert_eq!(
            encode_parameter(&scalar),
            json!({
                "name": "farm_id",
                "parameterType": {"type": "STRING"},
                "parameterValue": {"value": "F-1"}
            })
        );

        let array = QueryParameter {
            name: "ids".into(),
            kind: ParamType::String,
            value: ParamValue::Array(vec!["a".into(), "b".into()]),
        };
        assert_eq!(
            encode_parameter(&array),
            json!({
                "name": "ids",
                "parameterType": {"type": "ARRAY", "arrayType": {"type": "STRING"}},
                "parameterValue": {"arrayValues": [{"value": "a"}, {"value": "b"}]}
            })
        );
    }

    #[test]
    fn decodes_typed_cells() {
        let fields = vec![
            field("qty", "INTEGER"),
            field("temp", "FLOAT"),
            field("cold", "BOOLEAN"),
            field("at", "TIMESTAMP"),
            field("day", "DATE"),
            field("missing", "STRING"),
        ];
        let cells = serde_json::from_value::<Vec<TableCell>>(json!([
            {"v": "42"},
            {"v": "4.5"},
            {"v": "true"},
            {"v": "1.7172369E9"},
            {"v": "2024-06-01"},
            {"v": null}
        ]))
        .unwrap();

        let row = decode_record(&fields, cells).unwrap();
        assert_eq!(row["qty"], json!(42));
        assert_eq!(row["temp"], json!(4.5));
        assert_eq!(row["cold"], json!(true));
        assert_eq!(row["at"], json!("2024-06-01T10:00:00+00:00"));
        assert_eq!(row["day"], json!("2024-06-01"));
        assert_eq!(row["missing"], Value::Null);
    }

    #[test]
    fn decodes_repeated_and_record_cells() {
        let mut stops = field("stops", "STRING");
        stops.mode = Some("REPEATED".into());
        let mut loc = field("loc", "RECORD");
        loc.fields = vec![field("lat", "FLOAT"), field("lng", "FLOAT")];

        let cells = serde_json::from_value::<Vec<TableCell>>(json!([
            {"v": [{"v": "A"}, {"v": "B"}]},
            {"v": {"f": [{"v": "1.5"}, {"v": "2.5"}]}}
        ]))
        .unwrap();

        let row = decode_record(&[stops, loc], cells).unwrap();
        assert_eq!(row["stops"], json!(["A", "B"]));
        assert_eq!(row["loc"], json!({"lat": 1.5, "lng": 2.5}));
    }

    #[test]
    fn rejects_mismatched_rows() {
        let cells = serde_json::from_value::<Vec<TableCell>>(json!([{"v": "1"}])).unwrap();
        assert!(decode_record(&[], cells).is_err());
    }
}
