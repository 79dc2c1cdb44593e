//! Health and probe endpoints.

use crate::api::handlers::{AppState, PROVIDER_LABEL, SERVICE_VERSION};
use crate::api::models::{timestamp, ApiResponse, ApiStatus};
use crate::core::error_types::SERVER_RUNNING;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Basic health payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub uptime: f64,
    pub timestamp: String,
    #[serde(flatten)]
    pub api: ApiStatus,
    pub environment: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSettings {
    pub token_delay: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub port: u16,
    pub cors: String,
    pub streaming: StreamingSettings,
}

/// Detailed health payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthData {
    pub status: String,
    pub timestamp: String,
    pub uptime: f64,
    pub environment: String,
    pub api: ApiStatus,
    pub system: SystemInfo,
    pub config: ConfigSummary,
    pub services: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadyData {
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LiveData {
    pub alive: bool,
}

/// Basic health check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Server status", body = HealthData))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    tracing::debug!("Health check requested");

    let data = HealthData {
        status: SERVER_RUNNING.to_string(),
        uptime: state.uptime_secs(),
        timestamp: timestamp(),
        api: state.api_status(),
        environment: state.config.environment.clone(),
        version: SERVICE_VERSION.to_string(),
    };
    Json(ApiResponse::ok(data, "Health check completed"))
}

/// Health check with system and configuration details.
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses((status = 200, description = "Detailed status", body = DetailedHealthData))
)]
pub async fn health_detailed(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<DetailedHealthData>> {
    tracing::debug!("Detailed health check requested");

    let config = &state.config;
    let mut api = state.api_status();
    api.provider = PROVIDER_LABEL.to_string();

    let data = DetailedHealthData {
        status: SERVER_RUNNING.to_string(),
        timestamp: timestamp(),
        uptime: state.uptime_secs(),
        environment: config.environment.clone(),
        api,
        system: SystemInfo {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            pid: std::process::id(),
        },
        config: ConfigSummary {
            port: config.server.port,
            cors: config.cors.origin.clone(),
            streaming: StreamingSettings {
                token_delay: config.streaming.token_delay_ms,
                max_tokens: config.streaming.max_tokens,
                temperature: config.streaming.temperature,
                stream_timeout_secs: config.streaming.stream_timeout_secs,
            },
        },
        services: serde_json::json!({
            "chatService": "healthy",
            "streamingRelay": "healthy",
        }),
    };
    Json(ApiResponse::ok(data, "Detailed health check completed"))
}

/// Readiness probe.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses((status = 200, description = "Service is ready", body = ReadyData))
)]
pub async fn health_ready() -> Json<ApiResponse<ReadyData>> {
    Json(ApiResponse::ok(ReadyData { ready: true }, "Service is ready"))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = LiveData))
)]
pub async fn health_live() -> Json<ApiResponse<LiveData>> {
    Json(ApiResponse::ok(LiveData { alive: true }, "Service is alive"))
}
