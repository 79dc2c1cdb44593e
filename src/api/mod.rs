//! API layer for the chat relay server.
//!
//! HTTP handlers, request/response envelopes, the SSE transport and the
//! streaming relay, plus the router that wires them together.

pub mod disconnect;
pub mod handlers;
pub mod health;
pub mod models;
pub mod relay;
pub mod sse;

use crate::core::config::CorsConfig;
use crate::core::{request_id_middleware, MetricsMiddleware};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use handlers::AppState;
pub use models::{ApiResponse, ChatRequest, ErrorEnvelope};
pub use relay::{relay, RelayOptions, RelayState, RelaySummary};
pub use sse::{sse_channel, sse_response, ChannelTransport, SseTransport, TransportError, WireMessage};

/// OpenAPI document for the public endpoints.
#[derive(OpenApi)]
#[openapi(
    info(title = "LLM Chat Relay", description = "Chat API with SSE token streaming"),
    paths(
        handlers::stream_chat,
        handlers::chat,
        handlers::list_models,
        handlers::test_chat,
        handlers::chat_stats,
        health::health,
        health::health_detailed,
        health::health_ready,
        health::health_live,
    ),
    components(schemas(
        models::ChatRequest,
        models::ChatData,
        models::ModelsData,
        models::TestChatData,
        models::StatsData,
        models::ApiStatus,
        models::ErrorEnvelope,
        models::ErrorBody,
        crate::services::ModelSelection,
        health::HealthData,
        health::DetailedHealthData,
        health::ReadyData,
        health::LiveData,
    )),
    tags(
        (name = "chat", description = "Chat generation"),
        (name = "health", description = "Health and probes")
    )
)]
pub struct ApiDoc;

const CORS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// CORS policy from configuration. `*` allows any origin; otherwise a
/// comma-separated origin list.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(CORS_MAX_AGE);

    let origin = config.origin.trim();
    if origin == "*" {
        // Credentials cannot be combined with a wildcard origin
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origin
        .split(',')
        .filter_map(|o| {
            let o = o.trim();
            match HeaderValue::from_str(o) {
                Ok(value) if !o.is_empty() => Some(value),
                _ => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(config.credentials)
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let api_routes = Router::new()
        .route("/api/chat/stream", post(handlers::stream_chat))
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/models", get(handlers::list_models))
        .route("/api/chat/test", get(handlers::test_chat))
        .route("/api/chat/stats", get(handlers::chat_stats))
        .route("/api/models", get(handlers::list_models))
        .route("/api", get(handlers::api_index))
        .route("/health", get(health::health))
        .route("/health/detailed", get(health::health_detailed))
        .route("/health/ready", get(health::health_ready))
        .route("/health/live", get(health::health_live))
        .route("/", get(handlers::root))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .with_state(state);

    Router::new()
        .merge(swagger_ui)
        .merge(api_routes)
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
