//! LLM Chat Relay - chat backend with Server-Sent Events token streaming
//!
//! This library proxies chat prompts to an OpenAI-compatible provider (Groq)
//! and relays the generated tokens to the client:
//!
//! - **Streaming relay**: tokens are paced and framed as SSE `token` messages,
//!   terminated by exactly one `done` or `error` message
//! - **Mock fallback**: without an API key, a deterministic mock response is
//!   streamed instead
//! - **Non-streaming aggregation**: the same token sequence concatenated into
//!   a single JSON response
//! - **Model mapping**: client aliases resolved to provider model names
//! - **Metrics & Monitoring**: Prometheus metrics and request-scoped tracing
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, logging context, metrics, middleware
//! - [`services`]: token sources, model catalog, chat service
//! - [`api`]: HTTP handlers, SSE transport, streaming relay, router
//!
//! # Configuration
//!
//! All settings come from environment variables (a `.env` file is honoured):
//! - `HOST` / `PORT`: bind address (default: 0.0.0.0:5000)
//! - `GROQ_API_KEY`: upstream credential; unset means mock mode
//! - `DEFAULT_MODEL`: provider model for unknown aliases
//! - `TOKEN_DELAY`: pacing between streamed tokens in ms (default: 20)
//! - `STREAM_TIMEOUT_SECS`: optional bound on a streaming session

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{router, ApiDoc, AppState};
pub use core::{AppConfig, AppError, Result};
pub use services::{ChatService, Token, TokenSource, TokenStream};
