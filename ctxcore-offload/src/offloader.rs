//! The Content Offloader (§4.2): a policy layer above the Artifact Store
//! that decides when to write large content out-of-band and hand back a
//! pointer instead.

use std::sync::Arc;

use chrono::Utc;
use ctxcore_core::{
    is_sandbox_not_ready, sanitize_key, estimate_tokens_chars4, ArtifactMetadata,
    ArtifactReference, OffloadConfig, Scope, StoreError, TokenCounter,
};
use ctxcore_store::{ArtifactStore, StoreValue};
use rand::distr::Alphanumeric;
use rand::Rng;

const MANDATORY_CONTENT_TYPES: [&str; 10] = [
    "web_search",
    "websearch",
    "search",
    "tool_output",
    "file_content",
    "view_tasks",
    "terminal_output",
    "assistant_message",
    "browser_output",
    "long_response",
];

pub struct ContentOffloader {
    store: Arc<ArtifactStore>,
    config: OffloadConfig,
}

impl ContentOffloader {
    pub fn new(store: Arc<ArtifactStore>, config: OffloadConfig) -> Self {
        Self { store, config }
    }

    fn should_cache(&self, tokens: u64, chars: u64, force_cache: bool, content_type: &str) -> bool {
        if chars < self.config.min_chars {
            return false;
        }
        if force_cache || MANDATORY_CONTENT_TYPES.contains(&content_type) {
            return true;
        }
        tokens > self.config.token_threshold || chars > self.config.char_threshold
    }

    /// §4.2 offload operation. Returns `None` when the policy declines to
    /// cache, or when the store itself fails — quota and filesystem errors
    /// are swallowed here so the caller can keep the content inline.
    #[allow(clippy::too_many_arguments)]
    pub fn offload(
        &self,
        content: &str,
        content_type: &str,
        source_id: Option<&str>,
        metadata: Option<ArtifactMetadata>,
        custom_key: Option<&str>,
        ttl_hours: Option<i64>,
        force_cache: bool,
        counter: Option<&dyn TokenCounter>,
    ) -> Option<ArtifactReference> {
        let chars = content.chars().count() as u64;
        let tokens = counter
            .map(|c| c.count(content) as u64)
            .unwrap_or_else(|| estimate_tokens_chars4(content) as u64);

        if !self.should_cache(tokens, chars, force_cache, content_type) {
            return None;
        }

        let key = generate_key(content_type, source_id, custom_key);
        let (scope, default_ttl) = scope_and_ttl_for(content_type);
        let ttl_hours = ttl_hours.unwrap_or(default_ttl);

        let preview = build_preview(content);
        let summary = build_summary(content);

        let mut metadata = metadata.unwrap_or_default();
        metadata.preview = Some(preview.clone());
        metadata.summary = Some(summary.clone());
        metadata.source_id = source_id.map(str::to_string);

        match self.store.put(
            scope,
            &key,
            StoreValue::Text(content.to_string()),
            Some(ttl_hours),
            Some(metadata),
            Some(content_type.to_string()),
        ) {
            Ok(_) => {
                let artifact = match self.store.get_metadata(scope, &key) {
                    Ok(view) => view.artifact,
                    Err(e) => {
                        tracing::warn!(key, error = %e, "offload wrote content but metadata read-back failed");
                        return None;
                    }
                };
                let retrieval_hint = format!(
                    "use the expand-message tool with artifact_key=\"{key}\" to retrieve the full content"
                );
                Some(ArtifactReference::new(
                    &artifact,
                    preview,
                    summary,
                    tokens,
                    chars,
                    retrieval_hint,
                ))
            }
            Err(StoreError::QuotaError { .. }) => {
                tracing::info!(key, content_type, "offload skipped: scope quota exceeded");
                None
            }
            Err(StoreError::KVStoreError(message)) => {
                if is_sandbox_not_ready(&message) {
                    tracing::debug!(key, message, "offload skipped: sandbox not ready, will retry next turn");
                } else {
                    tracing::warn!(key, message, "offload skipped: unexpected store failure");
                }
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "offload skipped: store rejected the write");
                None
            }
        }
    }

    pub fn offload_tool_output(
        &self,
        tool_output: &str,
        tool_name: &str,
        tool_call_id: Option<&str>,
    ) -> Option<ArtifactReference> {
        let mut metadata = ArtifactMetadata::default();
        metadata.extra.insert(
            "tool_name".to_string(),
            serde_json::Value::String(tool_name.to_string()),
        );
        self.offload(
            tool_output,
            "tool_output",
            tool_call_id,
            Some(metadata),
            None,
            None,
            false,
            None,
        )
    }

    pub fn offload_search_results(
        &self,
        results: &str,
        search_type: &str,
        query: Option<&str>,
    ) -> Option<ArtifactReference> {
        let is_web_search = matches!(search_type, "web_search" | "websearch");
        let first = self.offload(results, search_type, query, None, None, None, is_web_search, None);
        if first.is_some() || !is_web_search {
            return first;
        }
        tracing::debug!(search_type, "web search offload returned null, retrying with force_cache");
        self.offload(results, "web_search", query, None, None, None, true, None)
    }

    pub fn offload_file_content(&self, content: &str, file_path: &str) -> Option<ArtifactReference> {
        self.offload(content, "file_content", Some(file_path), None, None, None, false, None)
    }
}

fn scope_and_ttl_for(content_type: &str) -> (Scope, i64) {
    match content_type {
        "conversation" | "summary" => (Scope::Project, 72),
        "file_content" => (Scope::Artifacts, 24),
        "search" | "tool_output" => (Scope::Artifacts, 48),
        _ => (Scope::Artifacts, 48),
    }
}

fn build_preview(content: &str) -> String {
    content.chars().take(ArtifactMetadata::PREVIEW_MAX_CHARS).collect()
}

fn build_summary(content: &str) -> String {
    const CAP: usize = ArtifactMetadata::SUMMARY_MAX_CHARS;
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::new();
    for sentence in split_sentences(&collapsed) {
        if out.chars().count() + sentence.chars().count() > CAP {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(sentence);
    }
    if out.is_empty() {
        out = collapsed.chars().take(CAP).collect();
    }
    out
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let end = (i + 1).min(bytes.len());
            sentences.push(text[start..end].trim());
            start = end;
        }
        i += 1;
    }
    if start < text.len() {
        sentences.push(text[start..].trim());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

fn generate_key(content_type: &str, source_id: Option<&str>, custom_key: Option<&str>) -> String {
    let sanitized_source = source_id.map(sanitize_key).unwrap_or_default();

    if let Some(custom_key) = custom_key {
        return if sanitized_source.is_empty() {
            custom_key.to_string()
        } else {
            format!("{custom_key}_{sanitized_source}")
        };
    }

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    if sanitized_source.is_empty() {
        format!("{content_type}_{timestamp}_{suffix}")
    } else {
        format!("{content_type}_{timestamp}_{suffix}_{sanitized_source}")
    }
}
