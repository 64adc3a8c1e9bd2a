//! Output shape of the Context Planner (§4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Scope;

/// One instruction candidate presented to the planner's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionCandidate {
    pub tag: String,
    pub description: String,
    pub tokens_estimate: u64,
    pub last_updated: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// One artifact candidate presented to the planner's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactCandidate {
    pub key: String,
    pub scope: Scope,
    pub description: String,
    pub preview: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub size_tokens: u64,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A single artifact the planner chose to include, with its justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedArtifact {
    pub key: String,
    pub scope: Scope,
    pub reason: String,
}

/// The planner's decision for a turn (§4.5). `raw_response` is kept for
/// diagnostics even when parsing required the keyword-heuristic fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPlan {
    pub instruction_tags: Vec<String>,
    pub artifacts: Vec<PlannedArtifact>,
    pub include_project_summary: bool,
    pub reasoning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ContextPlan {
    /// An empty plan, used when the planner is skipped or fails closed.
    pub fn empty(reasoning: impl Into<String>) -> Self {
        Self {
            instruction_tags: Vec::new(),
            artifacts: Vec::new(),
            include_project_summary: false,
            reasoning: reasoning.into(),
            raw_response: None,
        }
    }
}
