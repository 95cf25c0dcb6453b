//! Plain-language rewriting of stored article descriptions.
//!
//! Independent of the ingestion pipeline: it only reads article objects
//! through the [`StoreGateway`](crate::storage::StoreGateway).

mod config;
mod llm;
mod simplifier;

pub use config::LlmConfig;
pub use llm::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage, OpenAiCompatClient,
};
pub use simplifier::{SimplifiedArticle, Simplifier, SimplifyError};
