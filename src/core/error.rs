//! Error types and handling for the chat relay server.
//!
//! [`AppError`] covers every request-scoped failure that is reported through
//! the non-streaming JSON error envelope. Failures inside a running stream are
//! never converted to `AppError`; the relay reports those in-band.

use crate::api::models::ErrorEnvelope;
use crate::core::error_types::{FAILED_TO_START_STREAM, INVALID_JSON_BODY};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client provided invalid or incomplete data
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<Value>,
    },

    /// Route or resource does not exist
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        details: Option<Value>,
    },

    /// The response could not be switched into streaming mode
    #[error("Failed to start stream: {0}")]
    StreamSetup(String),

    /// Generic internal server errors with a user-facing message and optional cause
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        details: Option<Value>,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Option<Value>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Option<Value>) -> Self {
        AppError::Internal {
            message: message.into(),
            details,
        }
    }

    /// Strip internal causes before the error leaves the process.
    ///
    /// Validation and routing details stay; they describe the request, not
    /// the server.
    pub fn without_internal_details(self) -> Self {
        match self {
            AppError::Internal { message, details } => {
                if let Some(details) = details {
                    tracing::error!(message = %message, details = %details, "Internal error cause");
                }
                AppError::Internal {
                    message,
                    details: None,
                }
            }
            AppError::StreamSetup(cause) => {
                tracing::error!(error = %cause, "Stream setup error");
                AppError::internal(FAILED_TO_START_STREAM, None)
            }
            other => other,
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Serialization(_)
            | AppError::StreamSetup(_)
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(
            INVALID_JSON_BODY,
            Some(serde_json::json!({ "error": rejection.body_text() })),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, details) = match self {
            AppError::Config(e) => (e.to_string(), None),
            AppError::Serialization(e) => (e.to_string(), None),
            AppError::BadRequest { message, details }
            | AppError::NotFound { message, details }
            | AppError::Internal { message, details } => (message, details),
            AppError::StreamSetup(cause) => {
                tracing::error!(error = %cause, "Stream setup error");
                (
                    FAILED_TO_START_STREAM.to_string(),
                    Some(serde_json::json!({ "error": cause })),
                )
            }
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), message = %message, "Request failed");
        }

        let body = ErrorEnvelope::new(message, status.as_u16(), details);
        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
