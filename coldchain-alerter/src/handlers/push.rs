use axum::{Json, body::Bytes};
use serde::Serialize;

use crate::alert::{Alert, PushEnvelope, Severity, decode};

#[derive(Debug, Serialize)]
pub struct PushAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PushAck {
    fn acknowledged(message_id: Option<String>, alert: &Alert) -> Self {
        Self {
            status: "acknowledged",
            message_id,
            severity: match alert {
                Alert::Temperature(a) => Some(a.severity.as_str()),
                _ => None,
            },
            message: None,
        }
    }

    fn ignored(reason: impl ToString) -> Self {
        Self {
            status: "ignored",
            message_id: None,
            severity: None,
            message: Some(reason.to_string()),
        }
    }
}

fn log_alert(alert: &Alert, message_id: Option<&str>) {
    let message_id = message_id.unwrap_or("unknown");
    match alert {
        Alert::Temperature(a) => match a.severity {
            Severity::Critical => {
                tracing::error!(message_id, shipment_id = %a.shipment_id, "CRITICAL ALERT: {}", a.summary())
            }
            Severity::Warning => {
                tracing::warn!(message_id, shipment_id = %a.shipment_id, "WARNING: {}", a.summary())
            }
            Severity::Info => {
                tracing::info!(message_id, shipment_id = %a.shipment_id, "Cold chain info: {}", a.summary())
            }
        },
        Alert::Text(text) => tracing::info!(message_id, "Received non-JSON alert: {}", text),
        Alert::Empty => tracing::warn!(message_id, "Received Pub/Sub message with no data"),
    }
}

/// `POST /`: Pub/Sub push delivery of a cold chain alert.
///
/// Always answers 200 so Pub/Sub does not redeliver. Envelopes that cannot be
/// read are acknowledged as `ignored`.
pub async fn receive_push(body: Bytes) -> Json<PushAck> {
    let envelope = match serde_json::from_slice::<PushEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Push body is not a Pub/Sub envelope");
            metrics::counter!("cold_chain_alerts_total", "severity" => "ignored").increment(1);
            return Json(PushAck::ignored("Body is not a Pub/Sub push envelope."));
        }
    };

    let message_id = envelope
        .message
        .as_ref()
        .and_then(|m| m.message_id.clone());

    match decode(&envelope) {
        Ok(alert) => {
            log_alert(&alert, message_id.as_deref());
            metrics::counter!("cold_chain_alerts_total", "severity" => alert.kind()).increment(1);
            Json(PushAck::acknowledged(message_id, &alert))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                subscription = envelope.subscription.as_deref().unwrap_or("unknown"),
                "Ignoring malformed push message"
            );
            metrics::counter!("cold_chain_alerts_total", "severity" => "ignored").increment(1);
            Json(PushAck::ignored(e))
        }
    }
}
