//! Decoding and classification of cold chain alert messages.
//!
//! Publishers put either a JSON object or plain text in the Pub/Sub
//! `data` field. JSON alerts carry a `severity` that decides how loudly the
//! alert is logged.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value;
use service_core::extract::as_text;
use std::collections::HashMap;
use thiserror::Error;

/// Body Pub/Sub POSTs to a push endpoint.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: Option<PubSubMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "publish_time")]
    pub publish_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("Critical") => Severity::Critical,
            Some("Warning") => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureAlert {
    pub severity: Severity,
    pub shipment_id: String,
    pub temperature: String,
    pub message: String,
}

impl TemperatureAlert {
    fn from_object(payload: &serde_json::Map<String, Value>) -> Self {
        let field = |key: &str, default: &str| {
            payload
                .get(key)
                .and_then(as_text)
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            severity: Severity::parse(payload.get("severity").and_then(Value::as_str)),
            shipment_id: field("shipment_id", "Unknown Shipment"),
            temperature: field("temperature", "N/A"),
            message: field("message", "No message"),
        }
    }

    /// One-line summary used in the log record.
    pub fn summary(&self) -> String {
        let label = match self.severity {
            Severity::Critical => "HIGH TEMP",
            Severity::Warning => "Elevated Temp",
            Severity::Info => "Temp",
        };
        format!(
            "Shipment {}: {} {}°C - {}",
            self.shipment_id, label, self.temperature, self.message
        )
    }
}

/// What a push message turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Temperature(TemperatureAlert),
    Text(String),
    Empty,
}

impl Alert {
    /// Metric label for the alert.
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::Temperature(alert) => alert.severity.as_str(),
            Alert::Text(_) => "text",
            Alert::Empty => "empty",
        }
    }
}

/// Reasons a push message cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Envelope has no message.")]
    MissingMessage,
    #[error("Message data is not valid base64.")]
    InvalidBase64,
    #[error("Message data is not valid UTF-8.")]
    InvalidUtf8,
}

/// Decode the message carried by a push envelope.
pub fn decode(envelope: &PushEnvelope) -> Result<Alert, DecodeError> {
    let message = envelope
        .message
        .as_ref()
        .ok_or(DecodeError::MissingMessage)?;

    let Some(data) = message.data.as_deref().filter(|d| !d.is_empty()) else {
        return Ok(Alert::Empty);
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| DecodeError::InvalidBase64)?;
    let text = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;

    Ok(match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(payload)) => Alert::Temperature(TemperatureAlert::from_object(&payload)),
        _ => Alert::Text(text),
    })
}
