//! Request body extraction and the loose field coercions the handlers share.
//!
//! Callers of these services are conversational agents that are not strict
//! about JSON types: quantities arrive as `12`, `12.0` or `"12"`. The helpers
//! here accept those spellings and reject everything else with a 400.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::AppError;

/// A JSON object request body.
///
/// Rejects with 415 when the content type is not JSON and with 400 when a
/// JSON content type carries an invalid body or something other than an object.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?;

        if !is_json_content_type(&content_type) {
            tracing::warn!(content_type = %content_type, "Expected 'application/json'");
            return Err(AppError::UnsupportedMediaType);
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(JsonBody(map)),
            _ => {
                tracing::warn!("Invalid JSON body received");
                Err(AppError::InvalidJson)
            }
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

impl JsonBody {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field value as sent, or `null`. Used for columns stored verbatim.
    pub fn value(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Field value as sent, or the given default string.
    pub fn value_or(&self, key: &str, default: &str) -> Value {
        self.get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(default.to_string()))
    }

    /// Fail with every missing field listed, in the order given.
    pub fn require(&self, fields: &[&str]) -> Result<(), AppError> {
        let missing: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|f| !self.contains(f))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::missing(&missing))
        }
    }

    /// Text value of a field. Scalars are stringified.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(as_text)
    }

    /// Text value of a field, treating the empty string as absent.
    pub fn non_empty_text(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.is_empty())
    }

    /// Text value of a required field.
    pub fn required_text(&self, key: &str) -> Result<String, AppError> {
        self.text(key).ok_or_else(|| AppError::missing(&[key]))
    }

    /// Required integer field. Values that do not coerce are a 400 naming the field.
    pub fn required_int(&self, key: &str) -> Result<i64, AppError> {
        let value = self.get(key).ok_or_else(|| AppError::missing(&[key]))?;
        to_int(value).ok_or_else(|| invalid_integer(key))
    }

    pub fn optional_int(&self, key: &str) -> Result<Option<i64>, AppError> {
        self.get(key)
            .map(|v| to_int(v).ok_or_else(|| invalid_integer(key)))
            .transpose()
    }

    pub fn required_number(&self, key: &str) -> Result<f64, AppError> {
        let value = self.get(key).ok_or_else(|| AppError::missing(&[key]))?;
        to_float(value).ok_or_else(|| invalid_number(key))
    }

    pub fn optional_number(&self, key: &str) -> Result<Option<f64>, AppError> {
        self.get(key)
            .map(|v| to_float(v).ok_or_else(|| invalid_number(key)))
            .transpose()
    }

    pub fn required_date(&self, key: &str) -> Result<NaiveDate, AppError> {
        let value = self.get(key).ok_or_else(|| AppError::missing(&[key]))?;
        parse_date(value).ok_or_else(|| invalid_date(key))
    }

    pub fn optional_date(&self, key: &str) -> Result<Option<NaiveDate>, AppError> {
        self.get(key)
            .map(|v| parse_date(v).ok_or_else(|| invalid_date(key)))
            .transpose()
    }

    /// Truthiness of a flag field: `true`, non-zero numbers and non-empty strings.
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            _ => false,
        }
    }

    /// Non-empty list field, rejected with a 400 naming the field otherwise.
    pub fn non_empty_list(&self, key: &str) -> Result<&Vec<Value>, AppError> {
        match self.get(key) {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items),
            _ => Err(AppError::bad_request(format!(
                "Field '{}' must be a non-empty list.",
                key
            ))),
        }
    }
}

fn invalid_integer(key: &str) -> AppError {
    AppError::bad_request(format!("Invalid format for {}. Expected integer.", key))
}

fn invalid_number(key: &str) -> AppError {
    AppError::bad_request(format!("Invalid format for {}. Expected number.", key))
}

fn invalid_date(key: &str) -> AppError {
    AppError::bad_request(format!("Invalid {} format. Expected YYYY-MM-DD.", key))
}

/// Stringify a scalar JSON value. Arrays, objects and null have no text form.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Parse an ISO 8601 timestamp and re-emit it in normalised form.
///
/// Offsets (including `Z`) are kept as `+HH:MM`; naive timestamps stay naive.
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.to_rfc3339());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

/// Round to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
