//! LLM Chat Relay - Main entry point
//!
//! Builds the runtime, loads configuration from the environment, and serves
//! the HTTP API until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use chrono::Local;
use llm_chat_relay::{
    api::{router, AppState},
    core::{
        error_types::{API_CONFIGURED, SETUP_STEPS},
        init_metrics, AppConfig,
    },
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| {
            detect_cpu_limit().unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    let no_color = std::env::var("NO_COLOR").is_ok();
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Noise suppression is appended so a bare RUST_LOG=trace stays readable
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,llm_chat_relay=debug".to_string());
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    ));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_timer(LocalTime))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(!no_color),
            )
            .init();
    }
}

async fn async_main(worker_threads: usize) -> Result<()> {
    init_tracing();
    init_metrics();

    let config = Arc::new(AppConfig::from_env());
    let http_client = create_http_client(&config)?;
    let state = Arc::new(AppState::new(config.clone(), http_client));
    let app = router(state);

    let ip = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid HOST: {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    tracing::info!(worker_threads, "Tokio runtime started");
    log_banner(&config, addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn log_banner(config: &AppConfig, addr: SocketAddr) {
    tracing::info!("Starting LLM Chat Relay on {}", addr);
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Chat API: POST /api/chat/stream, POST /api/chat");
    tracing::info!("Models: GET /api/chat/models, GET /api/models");
    tracing::info!("Health: /health, /health/detailed, /health/ready, /health/live");
    tracing::info!("Swagger UI: /swagger-ui");
    tracing::info!("Metrics endpoint: /metrics");

    if config.is_api_key_configured() {
        tracing::info!(
            default_model = %config.upstream.default_model,
            "{}",
            API_CONFIGURED
        );
    } else {
        tracing::warn!("GROQ_API_KEY not configured, serving mock responses");
        for (i, step) in SETUP_STEPS.iter().enumerate() {
            tracing::warn!("  {}. {}", i + 1, step);
        }
    }
}

/// Create HTTP client with connection pooling
fn create_http_client(config: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

/// Detect CPU limit from cgroup (for containerized environments)
fn detect_cpu_limit() -> Option<usize> {
    // cgroup v2
    if let Ok(max) = std::fs::read_to_string("/sys/fs/cgroup/cpu.max") {
        let parts: Vec<&str> = max.split_whitespace().collect();
        if let [quota, period] = parts.as_slice() {
            if let (Ok(quota), Ok(period)) = (quota.parse::<i64>(), period.parse::<i64>()) {
                if quota > 0 && period > 0 {
                    return Some(((quota as f64 / period as f64).ceil() as usize).max(1));
                }
            }
        }
    }

    // cgroup v1
    let read = |path: &str| -> Option<i64> { std::fs::read_to_string(path).ok()?.trim().parse().ok() };
    let quota = read("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")?;
    let period = read("/sys/fs/cgroup/cpu/cpu.cfs_period_us")?;

    if quota > 0 && period > 0 {
        Some(((quota as f64 / period as f64).ceil() as usize).max(1))
    } else {
        None
    }
}
