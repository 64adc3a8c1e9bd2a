//! The Run Orchestrator (§4.9): the per-turn pipeline wiring the store,
//! compressor, planner, renderer, cache planner, and governor together
//! behind a single `run_turn` entry point, then dispatching to the LLM
//! transport with retry/backoff and fallback-model escalation.

use std::sync::Arc;

use ctxcore_cache::{plan_prompt_cache, PlannedMessage};
use ctxcore_compress::{apply_governor, compress, CompressionReport};
use ctxcore_context::{plan_context, render_auto_loaded_context, PlannerInputs, RenderTelemetry};
use ctxcore_core::{
    is_benign_control_error, ArtifactCandidate, CharRatioCounter, ContextCoreConfig, ContextPlan, InstructionCandidate,
    MemoryRef, MemoryType, Message, MessageContent, OrchestratorError, Role, Scope, TokenCounter,
};
use ctxcore_llm::{is_retryable_error, ChatRequest, ChatResponse, CircuitBreaker, CircuitBreakerConfig, LlmTransport, RetryPolicy};
use ctxcore_store::{ArtifactStore, MemoryStore};

use crate::interfaces::ConversationStore;
use crate::kv_tools::{get_project_summary, list_artifacts, list_instructions};
use crate::prefetch::prefetch_relevant_memory_refs;

const LOAD_BATCH_SIZE: usize = 1000;
const RESPONSE_TEMPERATURE: f32 = 0.7;
const RESPONSE_MAX_TOKENS: u32 = 4096;

/// §4.3 integration contract: a message payload at or above this size is
/// moved into the Memory Store and replaced with a summary.
const MEMORY_OFFLOAD_THRESHOLD_BYTES: usize = 6 * 1024;
const MEMORY_OFFLOAD_SUMMARY_CHARS: usize = 800;

/// Long-lived orchestrator state: the stores, the transport, and the
/// circuit breaker guarding it. One instance is shared across turns.
pub struct Orchestrator {
    pub store: Arc<ArtifactStore>,
    pub memory: Arc<MemoryStore>,
    pub transport: Arc<dyn LlmTransport>,
    pub config: ContextCoreConfig,
    retry_policy: RetryPolicy,
    circuit_breaker: CircuitBreaker,
}

impl Orchestrator {
    pub fn new(store: Arc<ArtifactStore>, memory: Arc<MemoryStore>, transport: Arc<dyn LlmTransport>, config: ContextCoreConfig) -> Self {
        Self {
            store,
            memory,
            transport,
            config,
            retry_policy: RetryPolicy::default(),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }
}

/// Per-turn caller-supplied inputs.
pub struct TurnInputs<'a> {
    pub thread_id: &'a str,
    pub user_message: &'a str,
    pub base_system_prompt: &'a str,
    pub model: &'a str,
    pub fallback_model: Option<&'a str>,
    pub context_window: u64,
    pub aggressive_mode: bool,
}

/// Everything a caller might want to observe or log about a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub response: ChatResponse,
    pub compression_report: Option<CompressionReport>,
    pub governor_directive: Option<&'static str>,
    pub plan: ContextPlan,
    pub render_telemetry: RenderTelemetry,
    pub planned_messages: Vec<PlannedMessage>,
    pub adaptive_input_count: usize,
    pub prefetched_count: usize,
    pub used_fallback_model: bool,
}

/// Step 1: page through the full thread history, oldest to newest.
async fn load_full_thread(conversation: &dyn ConversationStore, thread_id: &str) -> Result<Vec<Message>, OrchestratorError> {
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = conversation.list_messages(thread_id, true, LOAD_BATCH_SIZE, cursor.as_deref()).await?;
        let has_more = page.has_more;
        let next_cursor = page.messages.last().and_then(|m| m.message_id.clone());
        all.extend(page.messages);
        if !has_more {
            break;
        }
        match next_cursor {
            Some(id) => cursor = Some(id),
            None => break,
        }
    }
    Ok(all)
}

/// Step 2: messages tagged `arrived_mid_turn` by the conversation store are
/// counted for reporting; they are otherwise treated like any other message
/// in the loaded history.
fn count_adaptive_input(messages: &[Message]) -> usize {
    messages
        .iter()
        .filter(|m| {
            m.metadata
                .as_ref()
                .and_then(|meta| meta.extra.get("arrived_mid_turn"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        })
        .count()
}

/// §4.3 integration contract: any message whose content exceeds
/// `MEMORY_OFFLOAD_THRESHOLD_BYTES` is written to the Memory Store and
/// replaced in place with an 800-char summary carrying `memory_refs` and
/// `tokens_saved`. Messages that already carry `memory_refs` (offloaded on
/// an earlier turn, or by the compressor's pointer mode) are left alone.
fn offload_oversized_payloads(memory: &MemoryStore, messages: &mut [Message]) {
    for message in messages.iter_mut() {
        if message.has_memory_refs() {
            continue;
        }

        let original = message.content.as_text();
        if original.len() <= MEMORY_OFFLOAD_THRESHOLD_BYTES {
            continue;
        }

        let title = memory_title_for(message);
        let reference = match memory.put_text(&original, MemoryType::Conversation, None, None, Some(title.clone()), vec![]) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::warn!(error = %e, "failed to offload oversized message payload to the memory store");
                continue;
            }
        };

        let summary: String = original.chars().take(MEMORY_OFFLOAD_SUMMARY_CHARS).collect();
        let tokens_saved = (original.chars().count() / 4) as i64;

        let mut metadata = message.metadata.clone().unwrap_or_default();
        metadata.memory_refs.push(MemoryRef {
            id: reference.memory_id,
            title,
            mime: reference.mime,
        });
        metadata.tokens_saved = Some(tokens_saved);

        message.content = MessageContent::Text(summary);
        message.metadata = Some(metadata);
    }
}

fn memory_title_for(message: &Message) -> String {
    match &message.message_id {
        Some(id) => format!("{:?} payload {id}", message.role),
        None => format!("{:?} payload", message.role),
    }
}

fn build_instruction_catalog(store: &ArtifactStore) -> Vec<InstructionCandidate> {
    let Ok(tags) = list_instructions(store) else { return Vec::new() };
    let Ok(artifacts) = list_artifacts(store, Some(Scope::Instructions)) else { return Vec::new() };
    artifacts
        .into_iter()
        .filter_map(|artifact| {
            let tag = artifact.artifact_key.strip_prefix("instruction_")?.to_string();
            if !tags.contains(&tag) {
                return None;
            }
            Some(InstructionCandidate {
                tag,
                description: artifact.metadata.summary.clone().or(artifact.metadata.preview.clone()).unwrap_or_default(),
                tokens_estimate: artifact.size_bytes.div_ceil(4),
                last_updated: artifact.created_at,
                metadata: artifact.metadata.extra.clone(),
            })
        })
        .collect()
}

/// `list_artifacts` already returns the artifacts scope sorted by recency,
/// so capping to the catalog size here is all that's needed.
fn build_artifact_catalog(store: &ArtifactStore, cap: usize) -> Vec<ArtifactCandidate> {
    let Ok(artifacts) = list_artifacts(store, Some(Scope::Artifacts)) else { return Vec::new() };
    artifacts
        .into_iter()
        .take(cap)
        .map(|artifact| ArtifactCandidate {
            key: artifact.artifact_key,
            scope: artifact.scope,
            description: artifact.metadata.summary.clone().or(artifact.metadata.preview.clone()).unwrap_or_default(),
            preview: artifact.metadata.preview.clone().unwrap_or_default(),
            summary: artifact.metadata.summary.clone().unwrap_or_default(),
            created_at: artifact.created_at,
            expires_at: artifact.expires_at,
            size_bytes: artifact.size_bytes,
            size_tokens: artifact.size_bytes.div_ceil(4),
            metadata: artifact.metadata.extra,
        })
        .collect()
}

fn render_prefetch_block(prefetched: &[Message]) -> String {
    if prefetched.is_empty() {
        return String::new();
    }
    let body = prefetched.iter().map(|m| m.content.as_text()).collect::<Vec<_>>().join("\n\n");
    format!("\n\n# PREFETCHED MEMORY\n{body}\n")
}

/// Run the full per-turn pipeline and dispatch the prepared turn to the LLM
/// transport.
pub async fn run_turn(orchestrator: &Orchestrator, conversation: &dyn ConversationStore, inputs: TurnInputs<'_>) -> Result<TurnOutcome, OrchestratorError> {
    let counter = CharRatioCounter;

    // Step 1.
    let mut messages = load_full_thread(conversation, inputs.thread_id).await?;

    // §4.3 integration: offload oversized payloads before anything else
    // touches the message list, so prefetch and compression both see the
    // pointer form rather than the raw content.
    offload_oversized_payloads(&orchestrator.memory, &mut messages);

    // Step 2.
    let adaptive_input_count = count_adaptive_input(&messages);

    // Step 3: opportunistic prefetch, folded into the system prompt rather
    // than the message list so the cache planner's no-system-in-messages
    // contract (step 6) still holds.
    let prefetched = prefetch_relevant_memory_refs(&messages, inputs.user_message, &orchestrator.memory);
    let prefetched_count = prefetched.len();
    let prefetch_block = render_prefetch_block(&prefetched);

    // Step 4.
    let compression_report = compress(
        &mut messages,
        Some(inputs.base_system_prompt),
        inputs.context_window,
        None,
        true,
        &orchestrator.config.compress,
        &counter,
        true,
    );

    // Step 5.
    let instruction_catalog = build_instruction_catalog(&orchestrator.store);
    let artifact_catalog = build_artifact_catalog(&orchestrator.store, orchestrator.config.planner.artifact_catalog_cap);
    let project_summary = get_project_summary(&orchestrator.store).ok();
    let project_summary_preview = project_summary
        .as_deref()
        .map(|s| s.chars().take(orchestrator.config.planner.project_summary_preview_chars).collect::<String>());

    let planner_inputs = PlannerInputs {
        user_request: inputs.user_message,
        instruction_catalog: &instruction_catalog,
        artifact_catalog: &artifact_catalog,
        project_summary_preview: project_summary_preview.as_deref(),
        recent_context_hint: Some(inputs.user_message),
        aggressive_mode: inputs.aggressive_mode,
    };
    let plan = plan_context(&planner_inputs, orchestrator.transport.as_ref(), inputs.model, &orchestrator.config.planner).await;
    let rendered = render_auto_loaded_context(
        &plan,
        &artifact_catalog,
        &orchestrator.store,
        project_summary_preview.as_deref(),
        inputs.aggressive_mode,
        &orchestrator.config.renderer,
    );

    let mut working_system_prompt = inputs.base_system_prompt.to_string();
    if let Some(block) = &rendered.block {
        working_system_prompt.push_str(block);
    }
    working_system_prompt.push_str(&prefetch_block);

    // Step 6 is run after the governor (step 7) so the inserted directive,
    // if any, is itself eligible for live/historical placement and caching.
    let governor_directive = apply_governor(&mut messages, &orchestrator.config.governor, &counter);

    let conversation_only: Vec<Message> = messages.into_iter().filter(|m| !matches!(m.role, Role::System)).collect();
    let planned_messages = plan_prompt_cache(&working_system_prompt, &conversation_only, inputs.model, inputs.context_window, &orchestrator.config.cache, &counter);

    // Step 8.
    let request = ChatRequest {
        messages: planned_messages.iter().map(|p| p.message.clone()).collect(),
        model: inputs.model.to_string(),
        temperature: RESPONSE_TEMPERATURE,
        max_tokens: RESPONSE_MAX_TOKENS,
        tools: None,
        tool_choice: None,
        stream: false,
    };
    let (result, used_fallback_model) = dispatch_with_resilience(
        orchestrator.transport.as_ref(),
        &orchestrator.circuit_breaker,
        &orchestrator.retry_policy,
        request,
        inputs.fallback_model,
    )
    .await;
    let response = result?;

    Ok(TurnOutcome {
        response,
        compression_report,
        governor_directive,
        plan,
        render_telemetry: rendered.telemetry,
        planned_messages,
        adaptive_input_count,
        prefetched_count,
        used_fallback_model,
    })
}

/// Step 8's resilience wrapper: retry transient failures with exponential
/// backoff, skip retry/fallback entirely for benign control errors, and
/// escalate to `fallback_model` once if the primary model is still failing
/// when retries are exhausted.
async fn dispatch_with_resilience(
    transport: &dyn LlmTransport,
    circuit_breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    mut request: ChatRequest,
    fallback_model: Option<&str>,
) -> (Result<ChatResponse, OrchestratorError>, bool) {
    if !circuit_breaker.is_allowed() {
        return (Err(OrchestratorError::Transport("circuit breaker open, refusing call".to_string())), false);
    }

    let mut attempt = 1;
    loop {
        match transport.chat(request.clone()).await {
            Ok(response) => {
                circuit_breaker.record_success();
                return (Ok(response), false);
            }
            Err(e) => {
                let message = e.to_string();
                circuit_breaker.record_failure();

                if is_benign_control_error(&message) {
                    return (Err(e), false);
                }

                if attempt < policy.max_attempts && is_retryable_error(&message) {
                    let delay = policy.delay_for_attempt(attempt);
                    tracing::debug!(attempt, error = %message, "retrying turn dispatch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                let Some(fallback) = fallback_model else { return (Err(e), false) };
                if fallback == request.model {
                    return (Err(e), false);
                }
                tracing::debug!(fallback_model = fallback, error = %message, "escalating to fallback model after primary failure");
                request.model = fallback.to_string();
                return match transport.chat(request).await {
                    Ok(response) => {
                        circuit_breaker.record_success();
                        (Ok(response), true)
                    }
                    Err(e2) => {
                        circuit_breaker.record_failure();
                        (Err(e2), true)
                    }
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ctxcore_core::MemoryType;
    use ctxcore_llm::{ChatStream, UsageTelemetry};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockConversation {
        messages: Vec<Message>,
    }

    #[async_trait]
    impl ConversationStore for MockConversation {
        async fn list_messages(
            &self,
            _thread_id: &str,
            _is_llm_message: bool,
            batch: usize,
            after: Option<&str>,
        ) -> Result<crate::interfaces::MessagePage, OrchestratorError> {
            let start = match after {
                Some(id) => self.messages.iter().position(|m| m.message_id.as_deref() == Some(id)).map(|i| i + 1).unwrap_or(0),
                None => 0,
            };
            let end = (start + batch).min(self.messages.len());
            let page = self.messages[start..end].to_vec();
            Ok(crate::interfaces::MessagePage {
                messages: page,
                has_more: end < self.messages.len(),
            })
        }

        async fn get_thread(&self, thread_id: &str) -> Result<crate::interfaces::ThreadDescriptor, OrchestratorError> {
            Ok(crate::interfaces::ThreadDescriptor {
                thread_id: thread_id.to_string(),
                project_id: None,
                metadata: serde_json::json!({}),
            })
        }

        async fn get_project(&self, project_id: &str) -> Result<crate::interfaces::ProjectDescriptor, OrchestratorError> {
            Ok(crate::interfaces::ProjectDescriptor {
                id: project_id.to_string(),
                pass: String::new(),
                vnc_preview: None,
                sandbox_url: None,
                token: None,
            })
        }

        async fn insert_message(
            &self,
            _thread_id: &str,
            _message_type: &str,
            _content: &Message,
            _is_llm_message: bool,
            _metadata: Option<serde_json::Value>,
            _agent_id: Option<&str>,
            _agent_version_id: Option<&str>,
        ) -> Result<(), OrchestratorError> {
            Ok(())
        }
    }

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<String, String>>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmTransport for ScriptedTransport {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, OrchestratorError> {
            self.calls.lock().unwrap().push(request.model.clone());
            let next = self.responses.lock().unwrap().remove(0);
            match next {
                Ok(text) => Ok(ChatResponse {
                    content: text,
                    finish_reason: "stop".to_string(),
                    usage: UsageTelemetry::default(),
                }),
                Err(reason) => Err(OrchestratorError::Transport(reason)),
            }
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream, OrchestratorError> {
            Err(OrchestratorError::Transport("streaming not used in tests".to_string()))
        }
    }

    fn stores() -> (TempDir, TempDir, Arc<ArtifactStore>, Arc<MemoryStore>) {
        let artifact_dir = TempDir::new().unwrap();
        let memory_dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new(artifact_dir.path(), &[]).unwrap());
        let memory = Arc::new(MemoryStore::new(memory_dir.path()).unwrap());
        (artifact_dir, memory_dir, store, memory)
    }

    #[tokio::test]
    async fn happy_path_produces_a_response() {
        let (_a, _m, store, memory) = stores();
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![Ok("{}".to_string()), Ok("final answer".to_string())]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, memory, transport.clone(), ContextCoreConfig::default());
        let conversation = MockConversation {
            messages: vec![Message::new(Role::User, "hello there").with_id("m1")],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "hello there",
            base_system_prompt: "You are a helpful agent.",
            model: "claude-opus-4",
            fallback_model: None,
            context_window: 200_000,
            aggressive_mode: false,
        };
        let outcome = run_turn(&orchestrator, &conversation, inputs).await.unwrap();
        assert_eq!(outcome.response.content, "final answer");
        assert_eq!(outcome.adaptive_input_count, 0);
        assert_eq!(outcome.prefetched_count, 0);
        assert!(!outcome.used_fallback_model);
    }

    #[tokio::test]
    async fn adaptive_input_is_counted() {
        let (_a, _m, store, memory) = stores();
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![Ok("{}".to_string()), Ok("ok".to_string())]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, memory, transport, ContextCoreConfig::default());
        let mut metadata = ctxcore_core::MessageMetadata::default();
        metadata.extra.insert("arrived_mid_turn".to_string(), serde_json::json!(true));
        let conversation = MockConversation {
            messages: vec![
                Message::new(Role::User, "first").with_id("m1"),
                Message::new(Role::User, "second, arrived late").with_id("m2").with_metadata(metadata),
            ],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "second, arrived late",
            base_system_prompt: "system",
            model: "claude-opus-4",
            fallback_model: None,
            context_window: 200_000,
            aggressive_mode: false,
        };
        let outcome = run_turn(&orchestrator, &conversation, inputs).await.unwrap();
        assert_eq!(outcome.adaptive_input_count, 1);
    }

    #[tokio::test]
    async fn benign_error_skips_retry_and_fallback() {
        let (_a, _m, store, memory) = stores();
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![Ok("{}".to_string()), Err("request cancelled by user".to_string())]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, memory, transport.clone(), ContextCoreConfig::default());
        let conversation = MockConversation {
            messages: vec![Message::new(Role::User, "hi").with_id("m1")],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "hi",
            base_system_prompt: "system",
            model: "claude-opus-4",
            fallback_model: Some("claude-haiku-4"),
            context_window: 200_000,
            aggressive_mode: false,
        };
        let result = run_turn(&orchestrator, &conversation, inputs).await;
        assert!(result.is_err());
        // Only the planner call and the one primary attempt happened; no retry, no fallback.
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retries_exhaust_then_escalate_to_fallback_model() {
        let (_a, _m, store, memory) = stores();
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![
                Ok("{}".to_string()),
                Err("503 service unavailable".to_string()),
                Err("503 service unavailable".to_string()),
                Err("503 service unavailable".to_string()),
                Ok("fallback answer".to_string()),
            ]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator {
            retry_policy: RetryPolicy {
                base: std::time::Duration::from_millis(1),
                factor: 1.0,
                cap: std::time::Duration::from_millis(1),
                max_attempts: 3,
            },
            ..Orchestrator::new(store, memory, transport.clone(), ContextCoreConfig::default())
        };
        let conversation = MockConversation {
            messages: vec![Message::new(Role::User, "hi").with_id("m1")],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "hi",
            base_system_prompt: "system",
            model: "claude-opus-4",
            fallback_model: Some("claude-haiku-4"),
            context_window: 200_000,
            aggressive_mode: false,
        };
        let outcome = run_turn(&orchestrator, &conversation, inputs).await.unwrap();
        assert_eq!(outcome.response.content, "fallback answer");
        assert!(outcome.used_fallback_model);
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap(), "claude-haiku-4");
    }

    #[tokio::test]
    async fn prefetch_surfaces_relevant_memory_into_the_system_prompt() {
        let (_a, _m, store, memory) = stores();
        let reference = memory.put_text("deployment steps: one, two, three", MemoryType::Document, None, None, None, vec![]).unwrap();
        let mut metadata = ctxcore_core::MessageMetadata::default();
        metadata.memory_refs.push(ctxcore_core::MemoryRef {
            id: reference.memory_id,
            title: "deployment runbook".to_string(),
            mime: "text/plain".to_string(),
        });
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![Ok("{}".to_string()), Ok("ok".to_string())]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, memory, transport, ContextCoreConfig::default());
        let conversation = MockConversation {
            messages: vec![Message::new(Role::Tool, "ToolResult: stored").with_id("m1").with_metadata(metadata)],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "how do I follow the deployment runbook?",
            base_system_prompt: "system",
            model: "claude-opus-4",
            fallback_model: None,
            context_window: 200_000,
            aggressive_mode: false,
        };
        let outcome = run_turn(&orchestrator, &conversation, inputs).await.unwrap();
        assert_eq!(outcome.prefetched_count, 1);
    }

    #[tokio::test]
    async fn oversized_payload_is_offloaded_to_the_memory_store() {
        let (_a, _m, store, memory) = stores();
        let big_content = "x".repeat(7 * 1024);
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![Ok("{}".to_string()), Ok("ok".to_string())]),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, memory, transport, ContextCoreConfig::default());
        let conversation = MockConversation {
            messages: vec![
                Message::new(Role::User, "hello there").with_id("m1"),
                Message::new(Role::Tool, format!("ToolResult: {big_content}")).with_id("m2"),
            ],
        };
        let inputs = TurnInputs {
            thread_id: "t1",
            user_message: "hello there",
            base_system_prompt: "system",
            model: "claude-opus-4",
            fallback_model: None,
            context_window: 200_000,
            aggressive_mode: false,
        };
        let outcome = run_turn(&orchestrator, &conversation, inputs).await.unwrap();
        let offloaded = outcome
            .planned_messages
            .iter()
            .find_map(|p| p.message.metadata.as_ref())
            .filter(|meta| meta.has_memory_refs());
        let metadata = offloaded.expect("expected one planned message to carry memory_refs after offload");
        assert_eq!(metadata.memory_refs[0].mime, "text/plain");
        assert_eq!(metadata.tokens_saved, Some((7 * 1024 + "ToolResult: ".len()) as i64 / 4));
    }
}
