//! Token Source contract.
//!
//! A token source turns a prompt and a [`ModelSelection`] into a lazy,
//! ordered, finite and one-shot sequence of [`Token`]s. Consumers pull with
//! `StreamExt::next`; `None` means the sequence is exhausted.
//!
//! Contract:
//! - Content-generation failures never surface as `Err`; sources convert them
//!   into a regular diagnostic token with `finished = true`.
//! - `Err(SourceError)` is reserved for the sequence itself breaking.
//! - After a token with `finished = true` nothing else is yielded.

use crate::services::model_catalog::ModelSelection;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One incremental unit of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Text increment; may be empty
    pub content: String,
    /// True on the last token of the response
    pub finished: bool,
}

impl Token {
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: false,
        }
    }

    pub fn last(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: true,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// The token sequence itself broke while being pulled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("token sequence failed: {0}")]
pub struct SourceError(pub String);

/// Boxed token sequence returned by every [`TokenSource`].
pub type TokenStream = BoxStream<'static, Result<Token, SourceError>>;

/// Capability that produces the token sequence for one request.
pub trait TokenSource: Send + Sync {
    /// Start a fresh sequence. Sequences are not restartable; call again for
    /// every request.
    fn generate(&self, prompt: &str, model: &ModelSelection) -> TokenStream;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
