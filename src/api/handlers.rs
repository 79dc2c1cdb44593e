//! HTTP request handlers for the chat API.
//!
//! Streaming chat, non-streaming chat, model listing, test and stats
//! endpoints, the API directory, and Prometheus metrics.

use crate::api::models::*;
use crate::api::relay::{relay, RelayOptions};
use crate::api::sse::{sse_channel, sse_response};
use crate::core::config::AppConfig;
use crate::core::error_types::FAILED_TO_GENERATE_RESPONSE;
use crate::core::logging::{get_request_id, REQUEST_ID};
use crate::core::{AppError, Result, StreamCancelHandle};
use crate::services::model_catalog::DEFAULT_MODEL_ALIAS;
use crate::services::ChatService;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, Method, StatusCode, Uri},
    response::Response,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Provider label reported by the info endpoints.
pub const PROVIDER_LABEL: &str = "Groq (Free)";

pub const SERVICE_NAME: &str = "LLM Chat Relay";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default prompt of `GET /api/chat/test`.
pub const DEFAULT_TEST_MESSAGE: &str = "Hello, this is a test message";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chat_service: ChatService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, client: reqwest::Client) -> Self {
        let chat_service = ChatService::new(config.clone(), client);
        Self::with_service(config, chat_service)
    }

    pub fn with_service(config: Arc<AppConfig>, chat_service: ChatService) -> Self {
        Self {
            config,
            chat_service,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was built.
    /// Error as sent to the client: internal causes only in development.
    pub fn client_error(&self, error: AppError) -> AppError {
        if self.config.is_development() {
            error
        } else {
            error.without_internal_details()
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn api_status(&self) -> ApiStatus {
        let catalog = self.chat_service.catalog();
        ApiStatus {
            api_configured: self.config.is_api_key_configured(),
            available_models: catalog.aliases(),
            current_model: catalog.default_model().to_string(),
            provider: PROVIDER_LABEL.to_string(),
        }
    }

    pub fn models_data(&self) -> ModelsData {
        let catalog = self.chat_service.catalog();
        ModelsData {
            models: catalog.model_map(),
            providers: catalog.provider_map(),
            default: DEFAULT_MODEL_ALIAS.to_string(),
            fallback_groq_model: catalog.default_model().to_string(),
            provider: PROVIDER_LABEL.to_string(),
        }
    }
}

/// Stream a chat response as Server-Sent Events.
///
/// Validation and stream setup failures are answered with the JSON error
/// envelope. Once the SSE response is returned, every outcome is reported
/// in-band by the relay.
#[utoipa::path(
    post,
    path = "/api/chat/stream",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "SSE stream of token/done/error messages", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing message or malformed body", body = ErrorEnvelope),
        (status = 500, description = "Stream could not be started", body = ErrorEnvelope)
    )
)]
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let message = request.validated_message()?;
    let (selection, tokens) = state
        .chat_service
        .generate(&message, request.model.as_deref());

    let (mut transport, body) = sse_channel(StreamCancelHandle::new());
    let response = sse_response(body).map_err(|e| state.client_error(e))?;

    let options = RelayOptions::from(state.config.as_ref());
    let request_id = get_request_id();
    let span = tracing::info_span!(
        "relay",
        request_id = %request_id,
        model = %selection.resolved_model,
    );

    tokio::spawn(REQUEST_ID.scope(
        request_id,
        async move {
            relay(&mut transport, tokens, options).await;
        }
        .instrument(span),
    ));

    Ok(response)
}

/// Generate a complete chat response.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Aggregated response", body = ChatData),
        (status = 400, description = "Missing message or malformed body", body = ErrorEnvelope),
        (status = 500, description = "Generation failed", body = ErrorEnvelope)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatData>>> {
    let Json(request) = payload?;
    let message = request.validated_message()?;

    let completion = state
        .chat_service
        .complete(&message, request.model.as_deref())
        .await
        .map_err(|e| {
            state.client_error(AppError::internal(
                FAILED_TO_GENERATE_RESPONSE,
                Some(json!({ "error": e.to_string() })),
            ))
        })?;

    let data = ChatData {
        message_length: message.chars().count(),
        response_length: completion.response.chars().count(),
        response: completion.response,
        model: completion.selection,
    };
    Ok(Json(ApiResponse::ok(
        data,
        "Chat response generated successfully",
    )))
}

/// List available models.
#[utoipa::path(
    get,
    path = "/api/chat/models",
    tag = "chat",
    responses((status = 200, description = "Model aliases and providers", body = ModelsData))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ModelsData>> {
    Json(ApiResponse::ok(
        state.models_data(),
        "Available models retrieved successfully",
    ))
}

/// Run a non-streaming generation from query parameters.
#[utoipa::path(
    get,
    path = "/api/chat/test",
    tag = "chat",
    params(
        ("message" = Option<String>, Query, description = "Prompt, defaults to a fixed test message"),
        ("model" = Option<String>, Query, description = "Model alias")
    ),
    responses(
        (status = 200, description = "Test response", body = TestChatData),
        (status = 500, description = "Generation failed", body = ErrorEnvelope)
    )
)]
pub async fn test_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestChatQuery>,
) -> Result<Json<ApiResponse<TestChatData>>> {
    let test_message = query
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());

    let completion = state
        .chat_service
        .complete(&test_message, query.model.as_deref())
        .await
        .map_err(|e| {
            state.client_error(AppError::internal(
                "Test chat failed",
                Some(json!({ "error": e.to_string() })),
            ))
        })?;

    Ok(Json(ApiResponse::ok(
        TestChatData {
            test_message,
            response: completion.response,
            timestamp: timestamp(),
        },
        "Test chat completed successfully",
    )))
}

/// Service statistics.
#[utoipa::path(
    get,
    path = "/api/chat/stats",
    tag = "chat",
    responses((status = 200, description = "Statistics", body = StatsData))
)]
pub async fn chat_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let stats = StatsData {
        available_models: state.chat_service.catalog().len(),
        api_status: state.api_status(),
        server_uptime: state.uptime_secs(),
        version: SERVICE_VERSION.to_string(),
    };
    Json(ApiResponse::ok(
        stats,
        "Chat statistics retrieved successfully",
    ))
}

/// Endpoint directory.
pub async fn api_index() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "description": "AI-powered chat API with streaming support",
        "endpoints": {
            "health": {
                "/health": "Basic health check",
                "/health/detailed": "Detailed health check",
                "/health/ready": "Readiness probe",
                "/health/live": "Liveness probe",
            },
            "chat": {
                "POST /api/chat/stream": "Stream chat response",
                "POST /api/chat": "Get complete chat response",
                "GET /api/chat/models": "Get available models",
                "GET /api/chat/test": "Test endpoint",
                "GET /api/chat/stats": "Service statistics",
            },
            "models": {
                "GET /api/models": "Get available models (legacy)",
            },
            "observability": {
                "GET /metrics": "Prometheus metrics",
                "GET /swagger-ui": "OpenAPI documentation",
            },
        },
        "provider": PROVIDER_LABEL,
    }))
}

/// Welcome payload.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", SERVICE_NAME),
        "status": crate::core::error_types::SERVER_RUNNING,
        "timestamp": timestamp(),
        "version": SERVICE_VERSION,
        "endpoints": {
            "api": "/api",
            "health": "/health",
            "chat": "/api/chat",
            "models": "/api/models",
        },
    }))
}

/// Prometheus metrics in text exposition format.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::internal(e.to_string(), None))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(buffer.into())
        .map_err(|e| AppError::internal(e.to_string(), None))
}

/// Fallback for unknown routes.
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound {
        message: format!("Route {} not found", uri),
        details: Some(json!({
            "method": method.as_str(),
            "url": uri.to_string(),
        })),
    }
}
