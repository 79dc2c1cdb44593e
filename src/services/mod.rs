//! Token generation services.
//!
//! Token sources (live upstream and mock), model resolution, and the chat
//! service that ties them together for the HTTP layer.

pub mod chat_service;
pub mod mock_source;
pub mod model_catalog;
pub mod token_source;
pub mod upstream_source;

pub use chat_service::{aggregate, ChatService, Completion};
pub use mock_source::MockTokenSource;
pub use model_catalog::{ModelCatalog, ModelSelection};
pub use token_source::{SourceError, Token, TokenSource, TokenStream};
pub use upstream_source::{UpstreamFailure, UpstreamTokenSource};
