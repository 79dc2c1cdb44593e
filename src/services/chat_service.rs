//! Chat generation service.
//!
//! Picks the token source for a request (live upstream when a key is
//! configured, mock otherwise), resolves the model, and provides the
//! non-streaming aggregation path.

use crate::core::config::AppConfig;
use crate::services::mock_source::MockTokenSource;
use crate::services::model_catalog::{ModelCatalog, ModelSelection};
use crate::services::token_source::{SourceError, TokenSource, TokenStream};
use crate::services::upstream_source::UpstreamTokenSource;
use futures::stream::StreamExt;
use std::sync::Arc;

/// Aggregated result of a non-streaming chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub response: String,
    pub selection: ModelSelection,
}

/// Shared across all handlers; cheap to clone.
#[derive(Clone)]
pub struct ChatService {
    config: Arc<AppConfig>,
    catalog: ModelCatalog,
    live: Arc<dyn TokenSource>,
    fallback: Arc<dyn TokenSource>,
}

impl ChatService {
    pub fn new(config: Arc<AppConfig>, client: reqwest::Client) -> Self {
        let live = Arc::new(UpstreamTokenSource::new(client, &config));
        Self::with_sources(config, live, Arc::new(MockTokenSource::new()))
    }

    /// Build with explicit sources.
    pub fn with_sources(
        config: Arc<AppConfig>,
        live: Arc<dyn TokenSource>,
        fallback: Arc<dyn TokenSource>,
    ) -> Self {
        let catalog = ModelCatalog::new(config.upstream.default_model.clone());
        Self {
            config,
            catalog,
            live,
            fallback,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Whether requests go to the live provider.
    pub fn is_live(&self) -> bool {
        self.config.is_api_key_configured()
    }

    fn source(&self) -> &dyn TokenSource {
        if self.is_live() {
            self.live.as_ref()
        } else {
            self.fallback.as_ref()
        }
    }

    /// Resolve the model and start a fresh token sequence.
    pub fn generate(&self, message: &str, model: Option<&str>) -> (ModelSelection, TokenStream) {
        let selection = self.catalog.validate_model(model);
        let source = self.source();
        tracing::info!(
            source = source.name(),
            requested_model = %selection.requested_model,
            resolved_model = %selection.resolved_model,
            message_len = message.len(),
            "Starting token generation"
        );
        let tokens = source.generate(message, &selection);
        (selection, tokens)
    }

    /// Generate and collect the full response text.
    pub async fn complete(
        &self,
        message: &str,
        model: Option<&str>,
    ) -> Result<Completion, SourceError> {
        let (selection, tokens) = self.generate(message, model);
        let response = aggregate(tokens).await?;
        Ok(Completion {
            response,
            selection,
        })
    }
}

/// Concatenate token contents in order, stopping after the first finished
/// token or when the sequence ends.
pub async fn aggregate(mut tokens: TokenStream) -> Result<String, SourceError> {
    let mut response = String::new();
    while let Some(token) = tokens.next().await {
        let token = token?;
        response.push_str(&token.content);
        if token.finished {
            break;
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock_source::mock_tokens;
    use crate::services::token_source::Token;
    use futures::stream;

    /// Replays a fixed list of results regardless of input.
    struct ScriptedSource(Vec<Result<Token, SourceError>>);

    impl TokenSource for ScriptedSource {
        fn generate(&self, _prompt: &str, _model: &ModelSelection) -> TokenStream {
            stream::iter(self.0.clone()).boxed()
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn config_with_key(key: Option<&str>) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.upstream.api_key = key.map(str::to_string);
        Arc::new(config)
    }

    fn scripted(tokens: Vec<Result<Token, SourceError>>) -> Arc<dyn TokenSource> {
        Arc::new(ScriptedSource(tokens))
    }

    #[tokio::test]
    async fn test_aggregate_concatenates_in_order() {
        let tokens = stream::iter(vec![
            Ok(Token::partial("Hello ")),
            Ok(Token::partial("")),
            Ok(Token::last("world")),
        ])
        .boxed();
        assert_eq!(aggregate(tokens).await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_aggregate_stops_at_finished_token() {
        let tokens = stream::iter(vec![
            Ok(Token::last("done")),
            Ok(Token::partial("ignored")),
        ])
        .boxed();
        assert_eq!(aggregate(tokens).await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_aggregate_propagates_source_error() {
        let tokens = stream::iter(vec![
            Ok(Token::partial("partial")),
            Err(SourceError("reset".to_string())),
        ])
        .boxed();
        assert_eq!(
            aggregate(tokens).await,
            Err(SourceError("reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_no_key_uses_fallback() {
        let service = ChatService::with_sources(
            config_with_key(None),
            scripted(vec![Ok(Token::last("live"))]),
            Arc::new(MockTokenSource::new()),
        );
        assert!(!service.is_live());

        let completion = service.complete("hello", Some("gemma")).await.unwrap();
        let expected: String = mock_tokens("hello", "gemma")
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(completion.response, expected);
        assert_eq!(completion.selection.resolved_model, "gemma-7b-it");
    }

    #[tokio::test]
    async fn test_configured_key_uses_live_source() {
        let service = ChatService::with_sources(
            config_with_key(Some("gsk_live")),
            scripted(vec![Ok(Token::partial("from ")), Ok(Token::last("live"))]),
            scripted(vec![Ok(Token::last("mock"))]),
        );
        assert!(service.is_live());

        let completion = service.complete("hi", None).await.unwrap();
        assert_eq!(completion.response, "from live");
        assert_eq!(completion.selection.requested_model, "llama3-8b");
    }

    #[tokio::test]
    async fn test_placeholder_key_is_not_live() {
        let service = ChatService::with_sources(
            config_with_key(Some("your_groq_api_key_here")),
            scripted(vec![Ok(Token::last("live"))]),
            scripted(vec![Ok(Token::last("mock"))]),
        );
        assert!(!service.is_live());
        assert_eq!(service.complete("hi", None).await.unwrap().response, "mock");
    }
}
