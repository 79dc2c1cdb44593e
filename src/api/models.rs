//! API request and response models.
//!
//! Every JSON endpoint answers with either [`ApiResponse`] (success) or
//! [`ErrorEnvelope`] (failure). Both carry an RFC 3339 timestamp with
//! millisecond precision.

use crate::core::error::AppError;
use crate::core::error_types::MESSAGE_REQUIRED;
use crate::services::model_catalog::ModelSelection;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Longest message (in characters) forwarded to a token source.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Current time in the envelope timestamp format.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Trim, strip angle brackets, and cap the length of user input.
pub fn sanitize_input(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(MAX_MESSAGE_CHARS)
        .collect()
}

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"message": "explain how recursion works", "model": "llama3-8b"}))]
pub struct ChatRequest {
    /// User prompt; required and non-blank
    #[serde(default)]
    pub message: Option<String>,

    /// Model alias; unknown or missing names use the default model
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatRequest {
    /// Validate and sanitise the message.
    pub fn validated_message(&self) -> Result<String, AppError> {
        match self.message.as_deref() {
            Some(message) if !message.trim().is_empty() => Ok(sanitize_input(message)),
            _ => Err(AppError::bad_request(
                MESSAGE_REQUIRED,
                Some(json!({ "missingFields": ["message"] })),
            )),
        }
    }
}

/// Query of `GET /api/chat/test`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestChatQuery {
    pub message: Option<String>,
    pub model: Option<String>,
}

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            timestamp: timestamp(),
        }
    }
}

/// Body of the `error` field in [`ErrorEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    /// Structured context, `null` when absent
    pub details: Option<Value>,
}

/// Error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": {"message": "Message is required", "statusCode": 400, "details": {"missingFields": ["message"]}},
    "timestamp": "2024-01-01T00:00:00.000Z"
}))]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, status_code: u16, details: Option<Value>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                message: message.into(),
                status_code,
                details,
            },
            timestamp: timestamp(),
        }
    }
}

/// `data` of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    pub response: String,
    pub model: ModelSelection,
    /// Sanitised message length in characters
    pub message_length: usize,
    /// Response length in characters
    pub response_length: usize,
}

/// `data` of the model listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelsData {
    /// Alias → provider model
    pub models: BTreeMap<String, String>,
    /// Alias → provider
    pub providers: BTreeMap<String, String>,
    /// Alias used when none is requested
    pub default: String,
    /// Provider model used for unknown aliases
    pub fallback_groq_model: String,
    pub provider: String,
}

/// `data` of `GET /api/chat/test`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestChatData {
    pub test_message: String,
    pub response: String,
    pub timestamp: String,
}

/// Upstream API status shared by health and stats payloads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub api_configured: bool,
    pub available_models: Vec<String>,
    pub current_model: String,
    pub provider: String,
}

/// `data` of `GET /api/chat/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub available_models: usize,
    pub api_status: ApiStatus,
    /// Seconds since startup
    pub server_uptime: f64,
    pub version: String,
}
