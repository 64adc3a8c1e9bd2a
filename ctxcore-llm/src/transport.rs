//! The LLM transport surface this core consumes (§6). The wire format of
//! any concrete provider is out of scope here; this crate only defines the
//! shape callers are expected to implement and the resilience logic around
//! calling it.

use async_trait::async_trait;
use ctxcore_core::{Message, OrchestratorError};
use futures_util::stream::Stream;
use serde_json::Value;
use std::pin::Pin;

/// One chat call's inputs.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools: Option<Value>,
    pub tool_choice: Option<Value>,
    pub stream: bool,
}

/// Token usage telemetry, including the prompt-caching counters the cache
/// planner's effectiveness is judged against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTelemetry {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

/// A non-streaming chat response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: UsageTelemetry,
}

/// One chunk of a streamed response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatChunk {
    pub delta_text: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageTelemetry>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, OrchestratorError>> + Send>>;

/// The boundary this core calls out through to reach a real model. A
/// concrete implementation owns the provider's wire protocol, auth, and
/// connection pooling; this core only ever sees this trait.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, OrchestratorError>;

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, OrchestratorError>;
}
