//! Configuration management for the chat relay server.
//!
//! Configuration is read once at startup from environment variables (a `.env`
//! file is loaded first when present) and is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder value shipped in sample `.env` files. Treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_groq_api_key_here";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Deployment environment name ("development", "production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Upstream provider settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// CORS settings
    #[serde(default)]
    pub cors: CorsConfig,

    /// Token streaming settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout in seconds for the upstream provider
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Upstream (Groq, OpenAI-compatible) provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API key; `None` when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Provider model used when the requested model is unknown
    #[serde(default = "default_model")]
    pub default_model: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origin")]
    pub origin: String,

    #[serde(default = "default_enabled")]
    pub credentials: bool,
}

/// Token streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Pause between relayed tokens, in milliseconds
    #[serde(default = "default_token_delay")]
    pub token_delay_ms: u64,

    /// Maximum tokens requested from the upstream provider
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature sent upstream
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional upper bound on the whole relay session
    #[serde(default)]
    pub stream_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            default_model: default_model(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: default_cors_origin(),
            credentials: default_enabled(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            token_delay_ms: default_token_delay(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stream_timeout_secs: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            environment: default_environment(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            streaming: StreamingConfig::default(),
            verify_ssl: default_verify_ssl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_token_delay() -> u64 {
    20
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Self {
        // Skip in tests to avoid interference
        #[cfg(not(test))]
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Missing variables keep their defaults. Unparseable numeric values are
    /// logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT") {
            config.server.port = port;
        }

        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            config.environment = env;
        }

        config.upstream.api_key = lookup("GROQ_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if let Some(base) = lookup("GROQ_API_BASE") {
            config.upstream.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.upstream.default_model = model;
        }

        if let Some(origin) = lookup("CORS_ORIGIN") {
            config.cors.origin = origin;
        }
        if let Some(credentials) = lookup("CORS_CREDENTIALS") {
            config.cors.credentials = str_to_bool(&credentials);
        }

        if let Some(delay) = parse_var(&lookup, "TOKEN_DELAY") {
            config.streaming.token_delay_ms = delay;
        }
        if let Some(max_tokens) = parse_var(&lookup, "MAX_TOKENS") {
            config.streaming.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse_var(&lookup, "TEMPERATURE") {
            config.streaming.temperature = temperature;
        }
        config.streaming.stream_timeout_secs =
            parse_var::<u64, _>(&lookup, "STREAM_TIMEOUT_SECS").filter(|secs| *secs > 0);

        if let Some(verify_ssl) = lookup("VERIFY_SSL") {
            config.verify_ssl = str_to_bool(&verify_ssl);
        }
        if let Some(timeout) = parse_var(&lookup, "REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout;
        }

        config
    }

    /// Whether a usable upstream credential is present.
    pub fn is_api_key_configured(&self) -> bool {
        match self.upstream.api_key.as_deref().map(str::trim) {
            Some(key) => !key.is_empty() && key != PLACEHOLDER_API_KEY,
            None => false,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Pacing interval between relayed tokens.
    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.streaming.token_delay_ms)
    }

    /// Optional overall bound on a relay session.
    pub fn stream_timeout(&self) -> Option<Duration> {
        self.streaming.stream_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "Ignoring unparseable config value");
            None
        }
    }
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
