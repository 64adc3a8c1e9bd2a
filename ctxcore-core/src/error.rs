//! Error taxonomy for the context management core.
//!
//! Each domain gets its own `thiserror` enum; `ContextCoreError` folds them
//! into one master type the way `caliber-core::error::CaliberError` does.

use thiserror::Error;

/// Artifact Store errors (§4.1, §7).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("invalid value for key '{key}': {reason}")]
    ValueError { key: String, reason: String },

    #[error("scope '{scope}' quota exceeded: {used_bytes} + {new_bytes} > {quota_bytes}")]
    QuotaError {
        scope: String,
        used_bytes: u64,
        new_bytes: u64,
        quota_bytes: u64,
    },

    #[error("key '{key}' not found in scope '{scope}'")]
    KeyError { scope: String, key: String },

    #[error("KV store I/O error: {0}")]
    KVStoreError(String),
}

/// Content Offloader errors (§4.2).
#[derive(Debug, Clone, Error)]
pub enum OffloadError {
    #[error("sandbox not ready: {0}")]
    SandboxNotReady(String),

    #[error("unexpected offload failure: {0}")]
    Unexpected(String),
}

/// Message Compressor errors (§4.4).
#[derive(Debug, Clone, Error)]
pub enum CompressError {
    #[error("failed to serialize message content: {0}")]
    Serialization(String),
}

/// Context Planner errors (§4.5).
#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    #[error("planner LLM call failed: {0}")]
    LlmCallFailed(String),

    #[error("planner response was not valid JSON: {0}")]
    InvalidResponse(String),
}

/// Prompt Cache Planner errors (§4.7).
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("token scoring failed: {0}")]
    TokenScoring(String),
}

/// Token Governor errors (§4.8). The governor never fails in practice (it
/// only prepends directives) but the type exists for symmetry and future
/// fallibility at the call boundary.
#[derive(Debug, Clone, Error)]
pub enum GovernorError {
    #[error("unable to estimate tokens for message list: {0}")]
    EstimationFailed(String),
}

/// Run Orchestrator errors (§4.9).
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("conversation store error: {0}")]
    ConversationStore(String),

    #[error("sandbox filesystem error: {0}")]
    SandboxFs(String),

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("turn could not be produced: {0}")]
    TurnFailed(String),
}

/// Master error type for all context-core operations.
#[derive(Debug, Clone, Error)]
pub enum ContextCoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("offload error: {0}")]
    Offload(#[from] OffloadError),

    #[error("compress error: {0}")]
    Compress(#[from] CompressError),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("governor error: {0}")]
    Governor(#[from] GovernorError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

pub type ContextCoreResult<T> = Result<T, ContextCoreError>;

/// Classify an error message the way §7 classifies "sandbox-not-ready"
/// substrings: network/timeout/fs-init words mean "will succeed on a later
/// turn" and should log at debug, not warn.
pub fn is_sandbox_not_ready(message: &str) -> bool {
    const MARKERS: [&str; 9] = [
        "sandbox",
        "not found",
        "not available",
        "not started",
        "connection",
        "timeout",
        "filesystem",
        "create_folder",
        "upload_file",
    ];
    let lower = message.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}

/// Classify an LLM transport error message as "benign" (§4.9, §7): these
/// never trigger retry or fallback-model escalation.
pub fn is_benign_control_error(message: &str) -> bool {
    const MARKERS: [&str; 6] = [
        "not found",
        "cancelled",
        "canceled",
        "stopped by user",
        "billing",
        "auth",
    ];
    let lower = message.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_not_ready_markers() {
        assert!(is_sandbox_not_ready("Connection refused to sandbox"));
        assert!(is_sandbox_not_ready("make_dir: filesystem error"));
        assert!(!is_sandbox_not_ready("invalid utf-8 sequence"));
    }

    #[test]
    fn benign_markers() {
        assert!(is_benign_control_error("request cancelled by user"));
        assert!(is_benign_control_error("auth token expired"));
        assert!(!is_benign_control_error("internal server error"));
    }
}
