//! Rewrites a stored article's description in plain language.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::config::LlmConfig;
use super::llm::{CompletionRequest, LlmClient, LlmError};
use crate::feed::ArticleRecord;
use crate::storage::{StorageError, StoreGateway};

const SYSTEM_PROMPT: &str = "You are an expert at making academic content accessible to general audiences. \
Your task is to simplify complex academic descriptions into clear, easy-to-understand language.\n\n\
Guidelines:\n\
- Use simple, everyday words instead of technical jargon\n\
- Explain complex concepts in plain terms\n\
- Keep the main ideas and findings intact\n\
- Make it engaging and readable for non-experts\n\
- Aim for a reading level appropriate for undergraduate students\n\
- Keep the length reasonable (similar to or shorter than the original)\n\
- Do not add greetings or closing remarks, just provide the simplified text";

#[derive(Debug, thiserror::Error)]
pub enum SimplifyError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Invalid article JSON: {0}")]
    InvalidArticle(String),

    #[error("Article {0} has no description to simplify")]
    EmptyDescription(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<StorageError> for SimplifyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key, .. } => SimplifyError::NotFound(key),
            other => SimplifyError::Storage(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArticle {
    pub original: String,
    pub simplified: String,
    pub article: ArticleRecord,
}

/// Reads article objects through the gateway and asks the LLM for a
/// plain-language rewrite. Holds no state between calls.
pub struct Simplifier {
    llm: Arc<dyn LlmClient>,
    gateway: StoreGateway,
    config: LlmConfig,
}

impl Simplifier {
    pub fn new(llm: Arc<dyn LlmClient>, gateway: StoreGateway, config: LlmConfig) -> Self {
        Self {
            llm,
            gateway,
            config,
        }
    }

    pub async fn simplify(&self, key: &str) -> Result<SimplifiedArticle, SimplifyError> {
        let bytes = self.gateway.read(key).await?;
        let article: ArticleRecord = serde_json::from_slice(&bytes)
            .map_err(|e| SimplifyError::InvalidArticle(e.to_string()))?;

        let original = article.description.trim().to_string();
        if original.is_empty() {
            return Err(SimplifyError::EmptyDescription(article.identifier));
        }

        debug!(
            key = %key,
            provider = %self.llm.provider(),
            model = %self.llm.model(),
            chars = original.len(),
            "Requesting simplification"
        );

        let request = CompletionRequest::new(user_prompt(&original))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);
        let response = self.llm.complete(request).await?;

        let simplified = response.text.trim().to_string();
        if simplified.is_empty() {
            return Err(SimplifyError::EmptyResponse);
        }

        info!(
            identifier = %article.identifier,
            output_tokens = response.usage.output_tokens,
            "Simplified article description"
        );

        Ok(SimplifiedArticle {
            original,
            simplified,
            article,
        })
    }
}

fn user_prompt(description: &str) -> String {
    format!(
        "Please simplify the following academic description into easy-to-understand language:\n\n\
         {description}\n\n\
         Rewrite this in simple, clear terms that anyone can understand while preserving the key \
         information and findings."
    )
}
