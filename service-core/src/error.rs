use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::warehouse::WarehouseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required fields in body: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid JSON body received.")]
    InvalidJson,

    #[error("Unsupported Media Type. Expected 'application/json'.")]
    UnsupportedMediaType,

    #[error("{0}")]
    NotFound(String),

    #[error("Method {method} not allowed for path {path}.")]
    MethodNotAllowed { method: String, path: String },

    /// A warehouse or upstream API call failed. `details` carries the raw error text.
    #[error("{message}")]
    ServiceFailure { message: String, details: String },

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn missing(fields: &[&str]) -> Self {
        AppError::MissingFields(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn failure(message: impl Into<String>, details: impl ToString) -> Self {
        AppError::ServiceFailure {
            message: message.into(),
            details: details.to_string(),
        }
    }

    /// Wrap a warehouse error with a caller-facing message.
    pub fn warehouse(message: impl Into<String>, err: WarehouseError) -> Self {
        Self::failure(message, err)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::BadRequest(_) | AppError::InvalidJson => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::ServiceFailure { .. }
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// JSON envelope shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, details) = match self {
            AppError::ServiceFailure { message, details } => {
                tracing::error!(details = %details, "{}", message);
                (message, Some(details))
            }
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Unhandled internal error");
                ("An internal error occurred.".to_string(), None)
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                ("Configuration error".to_string(), None)
            }
            other => {
                tracing::warn!(status = %status, "{}", other);
                (other.to_string(), None)
            }
        };

        (
            status,
            Json(ErrorBody {
                status: "error",
                message,
                details,
            }),
        )
            .into_response()
    }
}
