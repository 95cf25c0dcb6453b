//! Mock LLM client for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::simplify::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Mock implementation of the LlmClient trait.
///
/// Returns a canned reply (or a configured error) and records every request.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    reply: Arc<RwLock<String>>,
    failure: Arc<RwLock<Option<LlmError>>>,
    requests: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Arc::new(RwLock::new(reply.into())),
            ..Default::default()
        }
    }

    pub async fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.write().await = reply.into();
    }

    pub async fn set_failure(&self, error: LlmError) {
        *self.failure.write().await = Some(error);
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.write().await.push(request);

        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }

        let text = self.reply.read().await.clone();
        Ok(CompletionResponse {
            usage: LlmUsage {
                input_tokens: 0,
                output_tokens: text.split_whitespace().count() as u32,
            },
            text,
            model: "mock-model".to_string(),
        })
    }
}
