//! Model name mapping.
//!
//! Client-facing model aliases are resolved once per request against a static
//! table into the provider-specific model name. Unknown or missing names fall
//! back to the configured default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Alias reported for requests that fall back to the default model.
pub const DEFAULT_MODEL_ALIAS: &str = "llama3-8b";

/// Provider label used for every table entry.
pub const DEFAULT_PROVIDER: &str = "groq";

/// (alias, provider model, provider)
const MODEL_TABLE: &[(&str, &str, &str)] = &[
    ("llama3-8b", "llama3-8b-8192", DEFAULT_PROVIDER),
    ("llama3-70b", "llama3-70b-8192", DEFAULT_PROVIDER),
    ("mixtral", "mixtral-8x7b-32768", DEFAULT_PROVIDER),
    ("gemma", "gemma-7b-it", DEFAULT_PROVIDER),
];

/// Resolved model for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelection {
    /// Name the client asked for (or the default alias)
    pub requested_model: String,
    /// Provider-specific model name sent upstream
    pub resolved_model: String,
    /// Provider serving the model
    pub provider: String,
}

/// Immutable alias table plus the configured default.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: BTreeMap<String, (String, String)>,
    default_model: String,
}

impl ModelCatalog {
    /// Build the catalog from the static table.
    ///
    /// `default_model` is the provider model used for unknown names.
    pub fn new(default_model: impl Into<String>) -> Self {
        let models = MODEL_TABLE
            .iter()
            .map(|(alias, model, provider)| {
                (alias.to_string(), (model.to_string(), provider.to_string()))
            })
            .collect();

        Self {
            models,
            default_model: default_model.into(),
        }
    }

    /// Resolve a requested model name. Never fails.
    pub fn validate_model(&self, requested: Option<&str>) -> ModelSelection {
        if let Some(name) = requested {
            if let Some((model, provider)) = self.models.get(name) {
                return ModelSelection {
                    requested_model: name.to_string(),
                    resolved_model: model.clone(),
                    provider: provider.clone(),
                };
            }
            tracing::debug!(requested = %name, "Unknown model, using default");
        }

        ModelSelection {
            requested_model: DEFAULT_MODEL_ALIAS.to_string(),
            resolved_model: self.default_model.clone(),
            provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Alias → provider model.
    pub fn model_map(&self) -> BTreeMap<String, String> {
        self.models
            .iter()
            .map(|(alias, (model, _))| (alias.clone(), model.clone()))
            .collect()
    }

    /// Alias → provider.
    pub fn provider_map(&self) -> BTreeMap<String, String> {
        self.models
            .iter()
            .map(|(alias, (_, provider))| (alias.clone(), provider.clone()))
            .collect()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
