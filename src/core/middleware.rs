//! HTTP middleware for request tracking and metrics.

use crate::core::logging::{generate_request_id, REQUEST_ID};
use crate::core::metrics::get_metrics;
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Assign a request id and run the rest of the stack inside its scope.
///
/// A well-formed `x-request-id` sent by the client is reused; otherwise a new
/// UUID is generated. The id is echoed on the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let mut response = REQUEST_ID.scope(request_id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

/// Metrics middleware.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Track metrics for incoming requests.
    ///
    /// This middleware:
    /// - Increments active request counter
    /// - Measures request duration
    /// - Records request count by status code
    /// - Logs request details
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let endpoint = request.uri().path().to_string();
        let method = request.method().to_string();

        // Skip metrics endpoint itself to avoid recursion
        if endpoint == "/metrics" {
            return next.run(request).await;
        }

        let metrics = get_metrics();
        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .inc();

        let start = Instant::now();
        let response = next.run(request).await;
        let duration = start.elapsed().as_secs_f64();
        let status_code = response.status().as_u16().to_string();

        metrics
            .request_count
            .with_label_values(&[&method, &endpoint, &status_code])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&method, &endpoint])
            .observe(duration);

        let is_streaming = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        // For streams the handler returns once headers are ready, so this is TTFB
        if is_streaming {
            tracing::info!(
                "{} {} - status={} ttfb={:.3}s",
                method,
                endpoint,
                status_code,
                duration
            );
        } else {
            tracing::info!(
                "{} {} - status={} duration={:.3}s",
                method,
                endpoint,
                status_code,
                duration
            );
        }

        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .dec();

        response
    }
}
