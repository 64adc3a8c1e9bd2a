//! The `Message` record (§3) and its supporting types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message's content: either a plain string or a structured object.
/// Pointer references (`ArtifactReference`) are carried as structured
/// content, never as raw strings, so I3 holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl MessageContent {
    /// Render the content as a string for char/token counting, JSON-encoding
    /// structured content the same way the compressor does before applying
    /// its length-based policies.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Structured(v) => {
                serde_json::to_string(v).unwrap_or_default()
            }
        }
    }

    pub fn char_len(&self) -> usize {
        match self {
            MessageContent::Text(s) => s.chars().count(),
            MessageContent::Structured(_) => self.as_text().chars().count(),
        }
    }

    /// True if this content looks like a pointer reference: `_cached: true`
    /// with an `artifact_key` set (used by the offloader's fast path and by
    /// I3 checks).
    pub fn is_pointer_reference(&self) -> bool {
        match self {
            MessageContent::Structured(Value::Object(map)) => {
                map.get("_cached").and_then(Value::as_bool) == Some(true)
                    && map.get("artifact_key").and_then(Value::as_str).is_some()
            }
            _ => false,
        }
    }
}

/// A reference to an offloaded artifact captured in a message's metadata
/// (distinct from the MemoryEntry CAS references nested in `memory_refs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRef {
    pub id: String,
    pub title: String,
    pub mime: String,
}

/// Optional metadata carried alongside a message. Known fields are typed;
/// everything else callers attach is preserved verbatim in `extra` so the
/// compressor and offloader never have to know about caller-specific keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_refs: Vec<MemoryRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_saved: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageMetadata {
    pub fn has_memory_refs(&self) -> bool {
        !self.memory_refs.is_empty()
    }
}

/// An immutable message record (§3). Compression operates on in-memory
/// copies only — this type is `Clone` precisely so every pass can produce a
/// new list without touching the authoritative store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            message_id: None,
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn char_len(&self) -> usize {
        self.content.char_len()
    }

    pub fn has_memory_refs(&self) -> bool {
        self.metadata.as_ref().is_some_and(MessageMetadata::has_memory_refs)
    }

    /// Recognize a tool-result message per §4.4 Stage 2: content is a
    /// string containing `ToolResult`, or a structured object carrying
    /// `tool_execution`/`interactive_elements`, or a JSON string that
    /// decodes to such an object.
    pub fn is_tool_result(&self) -> bool {
        match &self.content {
            MessageContent::Text(s) => {
                s.contains("ToolResult") || decodes_to_tool_shape(s)
            }
            MessageContent::Structured(v) => has_tool_shape(v),
        }
    }
}

fn has_tool_shape(v: &Value) -> bool {
    matches!(v, Value::Object(map) if map.contains_key("tool_execution") || map.contains_key("interactive_elements"))
}

fn decodes_to_tool_shape(s: &str) -> bool {
    serde_json::from_str::<Value>(s)
        .map(|v| has_tool_shape(&v))
        .unwrap_or(false)
}
