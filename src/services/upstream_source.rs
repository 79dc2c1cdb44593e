//! Live token source backed by the Groq OpenAI-compatible streaming API.
//!
//! Any failure of the live call is converted into a single diagnostic token
//! with `finished = true`; the returned sequence never yields `Err`.

use crate::core::config::AppConfig;
use crate::core::error_types::{
    API_ERROR_HEADING, INVALID_API_KEY, NETWORK_ERROR, RATE_LIMIT_EXCEEDED, SYSTEM_PROMPT,
};
use crate::core::metrics::get_metrics;
use crate::services::model_catalog::ModelSelection;
use crate::services::token_source::{Token, TokenSource, TokenStream};
use futures::stream::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

/// Upstream failure classes, each mapped to a fixed user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    Auth,
    RateLimited,
    Network,
    Unclassified(String),
}

impl UpstreamFailure {
    /// Classify a free-form failure signal (error message, status text).
    pub fn classify(signal: &str) -> Self {
        let lowered = signal.to_lowercase();
        if signal.contains("401") {
            UpstreamFailure::Auth
        } else if signal.contains("429") {
            UpstreamFailure::RateLimited
        } else if lowered.contains("network") || lowered.contains("fetch") {
            UpstreamFailure::Network
        } else {
            UpstreamFailure::Unclassified(signal.to_string())
        }
    }

    /// Classify a non-success HTTP status returned by the provider.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => UpstreamFailure::Auth,
            StatusCode::TOO_MANY_REQUESTS => UpstreamFailure::RateLimited,
            _ => {
                let mut signal = format!("HTTP {}", status.as_u16());
                if let Some(message) = message {
                    signal.push_str(": ");
                    signal.push_str(&message);
                }
                UpstreamFailure::Unclassified(signal)
            }
        }
    }

    /// Classify a transport-level client error.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_status(status, None);
        }
        if error.is_connect()
            || error.is_timeout()
            || error.is_request()
            || error.is_body()
            || error.is_decode()
        {
            return UpstreamFailure::Network;
        }
        Self::classify(&error.to_string())
    }

    /// Metric/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamFailure::Auth => "auth",
            UpstreamFailure::RateLimited => "rate_limited",
            UpstreamFailure::Network => "network",
            UpstreamFailure::Unclassified(_) => "unclassified",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            UpstreamFailure::Auth => INVALID_API_KEY.to_string(),
            UpstreamFailure::RateLimited => RATE_LIMIT_EXCEEDED.to_string(),
            UpstreamFailure::Network => NETWORK_ERROR.to_string(),
            UpstreamFailure::Unclassified(signal) => format!("Unexpected error: {}", signal),
        }
    }

    /// The diagnostic token that ends the sequence.
    pub fn into_token(self) -> Token {
        Token::last(format!("{}{}", API_ERROR_HEADING, self.user_message()))
    }
}

/// Record and convert a failure into its diagnostic token.
fn diagnostic(failure: UpstreamFailure, model: &str) -> Token {
    get_metrics()
        .upstream_failures
        .with_label_values(&[failure.kind()])
        .inc();
    tracing::warn!(
        kind = failure.kind(),
        model = %model,
        detail = ?failure,
        "Upstream call failed, emitting diagnostic token"
    );
    failure.into_token()
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

/// One parsed line of the upstream SSE body.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta { content: String, finished: bool },
    Done,
    Failed(String),
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| error.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return SseLine::Failed(message);
            }
            let Some(choice) = chunk.choices.into_iter().next() else {
                return SseLine::Skip;
            };
            SseLine::Delta {
                content: choice.delta.and_then(|d| d.content).unwrap_or_default(),
                finished: choice.finish_reason.is_some(),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable upstream chunk");
            SseLine::Skip
        }
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Token source calling the upstream provider.
#[derive(Clone)]
pub struct UpstreamTokenSource {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl UpstreamTokenSource {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            api_base: config.upstream.api_base.clone(),
            api_key: config.upstream.api_key.clone().unwrap_or_default(),
            temperature: config.streaming.temperature,
            max_tokens: config.streaming.max_tokens,
        }
    }

    fn request_body(&self, prompt: &str, model: &str) -> Value {
        json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": true,
        })
    }
}

impl TokenSource for UpstreamTokenSource {
    fn generate(&self, prompt: &str, model: &ModelSelection) -> TokenStream {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, &model.resolved_model));
        let model = model.resolved_model.clone();

        let stream = async_stream::stream! {
            tracing::debug!(model = %model, "Starting upstream completion stream");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Ok(diagnostic(UpstreamFailure::from_reqwest(&e), &model));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|body| extract_error_message(&body));
                yield Ok(diagnostic(UpstreamFailure::from_status(status, message), &model));
                return;
            }

            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut exhausted = false;

            while !exhausted {
                let lines: Vec<String> = match body.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                        let mut lines = Vec::new();
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
                        }
                        lines
                    }
                    Some(Err(e)) => {
                        yield Ok(diagnostic(UpstreamFailure::from_reqwest(&e), &model));
                        return;
                    }
                    None => {
                        exhausted = true;
                        // Trailing line without a newline terminator
                        if buffer.is_empty() {
                            Vec::new()
                        } else {
                            vec![String::from_utf8_lossy(&std::mem::take(&mut buffer)).into_owned()]
                        }
                    }
                };

                for line in lines {
                    match parse_sse_line(&line) {
                        SseLine::Delta { content, finished } => {
                            if !content.is_empty() || finished {
                                yield Ok(Token { content, finished });
                            }
                            if finished {
                                return;
                            }
                        }
                        SseLine::Done => {
                            yield Ok(Token::last(""));
                            return;
                        }
                        SseLine::Failed(message) => {
                            yield Ok(diagnostic(UpstreamFailure::classify(&message), &model));
                            return;
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            // Provider closed the body without a stop reason
            tracing::debug!(model = %model, "Upstream stream ended without finish_reason");
            yield Ok(Token::last(""));
        };

        stream.boxed()
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_classify_signals() {
        assert_eq!(
            UpstreamFailure::classify("401 Invalid API Key"),
            UpstreamFailure::Auth
        );
        assert_eq!(
            UpstreamFailure::classify("Error 429: too many requests"),
            UpstreamFailure::RateLimited
        );
        assert_eq!(
            UpstreamFailure::classify("Network unreachable"),
            UpstreamFailure::Network
        );
        assert_eq!(
            UpstreamFailure::classify("failed to fetch"),
            UpstreamFailure::Network
        );
        assert_matches!(
            UpstreamFailure::classify("model exploded"),
            UpstreamFailure::Unclassified(s) if s == "model exploded"
        );
    }

    #[test]
    fn test_rate_limit_diagnostic_token() {
        let token = UpstreamFailure::classify("429").into_token();
        assert!(token.finished);
        assert!(token.content.starts_with(API_ERROR_HEADING));
        assert!(token.content.contains(RATE_LIMIT_EXCEEDED));
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            UpstreamFailure::from_status(StatusCode::UNAUTHORIZED, None),
            UpstreamFailure::Auth
        );
        assert_eq!(
            UpstreamFailure::from_status(StatusCode::TOO_MANY_REQUESTS, Some("slow".into())),
            UpstreamFailure::RateLimited
        );
        assert_eq!(
            UpstreamFailure::from_status(StatusCode::BAD_GATEWAY, Some("upstream down".into())),
            UpstreamFailure::Unclassified("HTTP 502: upstream down".to_string())
        );
    }

    #[test]
    fn test_unclassified_message() {
        let failure = UpstreamFailure::Unclassified("HTTP 500".to_string());
        assert_eq!(failure.user_message(), "Unexpected error: HTTP 500");
        assert_eq!(failure.kind(), "unclassified");
    }

    #[test]
    fn test_parse_delta_line() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Delta {
                content: "Hel".to_string(),
                finished: false
            }
        );
    }

    #[test]
    fn test_parse_final_line_with_content() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"stop\"}]}\r";
        assert_eq!(
            parse_sse_line(line),
            SseLine::Delta {
                content: "!".to_string(),
                finished: true
            }
        );
    }

    #[test]
    fn test_parse_role_only_delta_is_empty() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Delta {
                content: String::new(),
                finished: false
            }
        );
    }

    #[test]
    fn test_parse_control_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Skip);
        assert_eq!(parse_sse_line(r#"data: {"choices":[]}"#), SseLine::Skip);
    }

    #[test]
    fn test_parse_inline_error() {
        let line = r#"data: {"error":{"message":"context length exceeded","type":"invalid_request_error"}}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Failed("context length exceeded".to_string())
        );
    }

    #[test]
    fn test_request_body_shape() {
        let config = AppConfig::default();
        let source = UpstreamTokenSource::new(reqwest::Client::new(), &config);
        let body = source.request_body("hi", "llama3-70b-8192");

        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }
}
