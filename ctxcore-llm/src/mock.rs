//! An in-memory `LlmTransport` for exercising orchestrator logic without a
//! real provider.

use async_trait::async_trait;
use ctxcore_core::OrchestratorError;
use futures_util::stream;
use std::sync::Mutex;

use crate::transport::{ChatChunk, ChatRequest, ChatResponse, ChatStream, LlmTransport, UsageTelemetry};

/// Replays a fixed queue of responses, or errors, one per call. Useful for
/// asserting retry/fallback behavior deterministically.
pub struct MockTransport {
    responses: Mutex<Vec<Result<ChatResponse, OrchestratorError>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Result<ChatResponse, OrchestratorError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }

    pub fn single(content: impl Into<String>) -> Self {
        Self::new(vec![Ok(ChatResponse {
            content: content.into(),
            finish_reason: "stop".to_string(),
            usage: UsageTelemetry::default(),
        })])
    }
}

#[async_trait]
impl LlmTransport for MockTransport {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, OrchestratorError> {
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        if responses.is_empty() {
            return Err(OrchestratorError::Transport("mock transport exhausted".to_string()));
        }
        responses.remove(0)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, OrchestratorError> {
        let response = self.chat(request).await?;
        let chunk = ChatChunk {
            delta_text: Some(response.content),
            finish_reason: Some(response.finish_reason),
            usage: Some(response.usage),
        };
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}
