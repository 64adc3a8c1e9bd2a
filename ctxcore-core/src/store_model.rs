//! Data model for the Artifact Store (§4.1) and Memory Store (§4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied metadata attached to an artifact at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArtifactMetadata {
    /// Short preview of the content, capped at 200 chars by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// Longer summary, capped at 400 chars by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArtifactMetadata {
    pub const PREVIEW_MAX_CHARS: usize = 200;
    pub const SUMMARY_MAX_CHARS: usize = 400;

    /// Truncate `preview`/`summary` to their store-enforced caps in place.
    pub fn clamp(&mut self) {
        if let Some(p) = &mut self.preview {
            truncate_chars(p, Self::PREVIEW_MAX_CHARS);
        }
        if let Some(s) = &mut self.summary {
            truncate_chars(s, Self::SUMMARY_MAX_CHARS);
        }
    }
}

fn truncate_chars(s: &mut String, max_chars: usize) {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        *s = truncated;
    }
}

/// A stored artifact as recorded in a scope's index (§3, §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_key: String,
    pub scope: crate::Scope,
    pub content_type: String,
    pub size_bytes: u64,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_hours: i64,
    pub metadata: ArtifactMetadata,
}

impl Artifact {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The pointer shape that replaces raw content in a message once offloaded
/// (§4.2). `cached` serializes as `_cached` to match the wire shape callers
/// pattern-match on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReference {
    #[serde(rename = "_cached")]
    pub cached: bool,

    pub artifact_key: String,
    pub scope: crate::Scope,
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    pub preview: String,
    pub summary: String,
    pub size_tokens: u64,
    pub size_chars: u64,
    pub retrieval_hint: String,
    pub metadata: ArtifactMetadata,
}

impl ArtifactReference {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        artifact: &Artifact,
        preview: String,
        summary: String,
        size_tokens: u64,
        size_chars: u64,
        retrieval_hint: String,
    ) -> Self {
        Self {
            cached: true,
            artifact_key: artifact.artifact_key.clone(),
            scope: artifact.scope,
            content_type: artifact.content_type.clone(),
            source_id: artifact.metadata.source_id.clone(),
            preview,
            summary,
            size_tokens,
            size_chars,
            retrieval_hint,
            metadata: artifact.metadata.clone(),
        }
    }
}

/// Compression codec applied to a memory-store blob (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    None,
    Zstd,
}

/// Classification of a memory entry, used for retention and retrieval
/// heuristics distinct from the artifact store's scope partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Conversation,
    Document,
    ToolOutput,
    Summary,
}

/// A content-addressed entry in the Memory Store (§4.3). `hash` is the
/// SHA-256 hex digest of the uncompressed bytes and doubles as the CAS key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub hash: String,
    pub memory_type: MemoryType,
    pub compression: CompressionKind,
    pub original_size_bytes: u64,
    pub stored_size_bytes: u64,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl MemoryEntry {
    /// Two-character fan-out prefix used for the CAS directory layout
    /// (`warm/{hash[:2]}/{hash}.zst`).
    pub fn shard_prefix(&self) -> &str {
        &self.hash[..2.min(self.hash.len())]
    }
}
