//! Retrieval Renderer (§4.6): turns a `ContextPlan` into the "AUTO-LOADED
//! CONTEXT" block appended to the system prompt for one turn.

use chrono::{DateTime, Utc};
use ctxcore_core::{ArtifactCandidate, ContextPlan, RendererConfig, Scope};
use ctxcore_store::{ArtifactStore, AsType, RetrievedValue};
use serde_json::Value;

const KEYWORD_TRIGGERS: &[&str] = &[
    "insert",
    "include",
    "verbatim",
    "quote",
    "paste",
    "deliverable",
    "final draft",
    "document body",
    "table",
    "chart data",
    "appendix",
];

/// Per-artifact stats reported alongside the rendered block.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRenderStats {
    pub key: String,
    pub scope: Scope,
    pub hydrated: bool,
    pub est_tokens: u64,
}

/// Telemetry returned alongside the rendered block (§4.6).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderTelemetry {
    pub aggressive_mode: bool,
    pub instruction_count: usize,
    pub artifact_count: usize,
    pub hydrated_count: usize,
    pub stub_count: usize,
    pub est_tokens_hydrated: u64,
    pub est_tokens_stubbed: u64,
    pub per_artifact: Vec<ArtifactRenderStats>,
    pub instruction_tags: Vec<String>,
}

/// The rendered block and its telemetry. `block` is `None` when nothing was
/// selected and there is nothing to render.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedContext {
    pub block: Option<String>,
    pub telemetry: RenderTelemetry,
}

/// Render `plan` into the AUTO-LOADED CONTEXT block. `artifact_catalog` must
/// be the same catalog the plan was computed against, since it is the only
/// place `size_tokens` and planner-facing metadata live.
pub fn render_auto_loaded_context(
    plan: &ContextPlan,
    artifact_catalog: &[ArtifactCandidate],
    store: &ArtifactStore,
    project_summary_preview: Option<&str>,
    aggressive_mode: bool,
    config: &RendererConfig,
) -> RenderedContext {
    let mut telemetry = RenderTelemetry {
        aggressive_mode,
        instruction_count: plan.instruction_tags.len(),
        artifact_count: plan.artifacts.len(),
        instruction_tags: plan.instruction_tags.clone(),
        ..Default::default()
    };

    let instructions_section = render_instructions(plan, store);

    let mut artifact_blocks = Vec::new();
    for planned in &plan.artifacts {
        let Some(candidate) = artifact_catalog
            .iter()
            .find(|c| c.scope == planned.scope && c.key == planned.key)
        else {
            continue;
        };

        let hydrate = should_hydrate(candidate, &planned.reason, aggressive_mode);
        let est_tokens = candidate.size_tokens;
        if hydrate {
            telemetry.hydrated_count += 1;
            telemetry.est_tokens_hydrated += est_tokens;
        } else {
            telemetry.stub_count += 1;
            telemetry.est_tokens_stubbed += est_tokens;
        }
        telemetry.per_artifact.push(ArtifactRenderStats {
            key: planned.key.clone(),
            scope: planned.scope,
            hydrated: hydrate,
            est_tokens,
        });

        artifact_blocks.push(render_artifact_block(candidate, planned, hydrate, store, aggressive_mode, config));
    }

    // `project_summary_preview` is already trimmed to its ≤400 char cap by
    // the planner (§4.5); the renderer just decides whether to include it.
    let project_summary_section = if plan.include_project_summary {
        project_summary_preview.map(|preview| format!("## Project Summary\n{preview}\n"))
    } else {
        None
    };

    let has_content = instructions_section.is_some() || !artifact_blocks.is_empty() || project_summary_section.is_some();
    if !has_content {
        return RenderedContext { block: None, telemetry };
    }

    let mut body = String::from("\n\n# AUTO-LOADED CONTEXT\n");
    if !plan.reasoning.trim().is_empty() {
        body.push_str(&format!("Planner rationale: {}\n", plan.reasoning.trim()));
    }
    if let Some(section) = project_summary_section {
        body.push_str(&section);
    }
    if let Some(section) = instructions_section {
        body.push_str(&section);
    }
    for block in artifact_blocks {
        body.push_str(&block);
    }

    RenderedContext {
        block: Some(body),
        telemetry,
    }
}

fn render_instructions(plan: &ContextPlan, store: &ArtifactStore) -> Option<String> {
    if plan.instruction_tags.is_empty() {
        return None;
    }
    let mut section = String::from("## Auto-loaded Instructions\n");
    let mut any = false;
    for tag in &plan.instruction_tags {
        let key = format!("instruction_{tag}");
        match store.get(Scope::Instructions, &key, AsType::Str) {
            Ok(RetrievedValue::Str(content)) => {
                section.push_str(&format!("### {tag}\n{content}\n"));
                any = true;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(tag, error = %e, "skipping instruction that could not be read"),
        }
    }
    any.then_some(section)
}

fn should_hydrate(candidate: &ArtifactCandidate, reason: &str, aggressive_mode: bool) -> bool {
    if candidate
        .metadata
        .get("forced_for_tool")
        .and_then(Value::as_str)
        == Some("create_document")
    {
        return true;
    }

    let has_keyword_trigger = {
        let lowered = reason.to_lowercase();
        KEYWORD_TRIGGERS.iter().any(|kw| lowered.contains(kw))
    };

    // `size_tokens == 0` is treated as "unavailable": the offloader never
    // writes a zero-token artifact, so a genuine zero never reaches here.
    if candidate.size_tokens == 0 {
        return has_keyword_trigger && !aggressive_mode;
    }

    if aggressive_mode {
        candidate.size_tokens <= 900 || (candidate.size_tokens <= 3200 && has_keyword_trigger)
    } else {
        candidate.size_tokens <= 2000 || (candidate.size_tokens <= 5000 && has_keyword_trigger)
    }
}

fn render_artifact_block(
    candidate: &ArtifactCandidate,
    planned: &ctxcore_core::PlannedArtifact,
    hydrate: bool,
    store: &ArtifactStore,
    aggressive_mode: bool,
    config: &RendererConfig,
) -> String {
    let summary_cap = if aggressive_mode {
        config.stub_summary_chars_aggressive
    } else {
        config.stub_summary_chars_normal
    };
    let summary: String = candidate.summary.chars().take(summary_cap).collect();

    let mut block = String::new();
    block.push_str(&format!("- Artifact `{}` (scope: {})\n", candidate.key, candidate.scope));
    block.push_str(&format!("  - summary: {summary}\n"));
    block.push_str(&format!("  - planner reason: {}\n", planned.reason));
    block.push_str(&format!("  - est. tokens: {}\n", candidate.size_tokens));
    block.push_str(&format!("  - size: {} chars\n", candidate.preview.len().max(candidate.size_bytes as usize)));
    block.push_str(&format!("  - cached_at: {}\n", format_timestamp(candidate.created_at)));
    if let Some(origin) = candidate.metadata.get("origin_tool").and_then(Value::as_str) {
        block.push_str(&format!("  - origin tool: {origin}\n"));
    }
    block.push_str("  - note: the planner can hydrate additional slices of this artifact on demand.\n");

    if hydrate {
        if let Some(excerpt) = fetch_excerpt(candidate, store, aggressive_mode, config) {
            block.push_str(&format!("  Hydrated excerpt:\n  {excerpt}\n"));
        }
    }

    block
}

fn fetch_excerpt(
    candidate: &ArtifactCandidate,
    store: &ArtifactStore,
    aggressive_mode: bool,
    config: &RendererConfig,
) -> Option<String> {
    let cap = if aggressive_mode {
        config.hydrated_excerpt_chars_aggressive
    } else {
        config.hydrated_excerpt_chars_normal
    };

    let raw = match store.get(candidate.scope, &candidate.key, AsType::Auto).ok()? {
        RetrievedValue::Str(s) => s,
        RetrievedValue::Dict(v) => serde_json::to_string(&v).unwrap_or_default(),
        RetrievedValue::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
    };

    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= cap {
        Some(raw)
    } else {
        let truncated: String = chars[..cap].iter().collect();
        Some(format!("{truncated}...[truncated]"))
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxcore_core::{PlannedArtifact, Scope};
    use serde_json::json;
    use tempfile::tempdir;

    fn candidate(key: &str, size_tokens: u64) -> ArtifactCandidate {
        ArtifactCandidate {
            key: key.to_string(),
            scope: Scope::Task,
            description: "desc".into(),
            preview: "preview text".into(),
            summary: "a useful summary".into(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            size_bytes: 500,
            size_tokens,
            metadata: Default::default(),
        }
    }

    #[test]
    fn empty_plan_renders_no_block() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        let plan = ContextPlan::empty("nothing selected");
        let rendered = render_auto_loaded_context(&plan, &[], &store, None, false, &RendererConfig::default());
        assert!(rendered.block.is_none());
    }

    #[test]
    fn small_artifact_is_hydrated_unconditionally() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        store
            .put(
                Scope::Task,
                "small_artifact",
                "the full content".into(),
                None,
                Default::default(),
                Some("text/plain".to_string()),
            )
            .unwrap();

        let plan = ContextPlan {
            instruction_tags: vec![],
            artifacts: vec![PlannedArtifact {
                key: "small_artifact".into(),
                scope: Scope::Task,
                reason: "directly relevant".into(),
            }],
            include_project_summary: false,
            reasoning: "test".into(),
            raw_response: None,
        };
        let catalog = vec![candidate("small_artifact", 500)];
        let rendered = render_auto_loaded_context(&plan, &catalog, &store, None, false, &RendererConfig::default());
        let block = rendered.block.unwrap();
        assert!(block.contains("Hydrated excerpt"));
        assert_eq!(rendered.telemetry.hydrated_count, 1);
        assert_eq!(rendered.telemetry.stub_count, 0);
    }

    #[test]
    fn large_artifact_without_keyword_trigger_stays_a_stub() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        let plan = ContextPlan {
            instruction_tags: vec![],
            artifacts: vec![PlannedArtifact {
                key: "big_artifact".into(),
                scope: Scope::Task,
                reason: "might be useful later".into(),
            }],
            include_project_summary: false,
            reasoning: "test".into(),
            raw_response: None,
        };
        let catalog = vec![candidate("big_artifact", 9000)];
        let rendered = render_auto_loaded_context(&plan, &catalog, &store, None, false, &RendererConfig::default());
        let block = rendered.block.unwrap();
        assert!(!block.contains("Hydrated excerpt"));
        assert_eq!(rendered.telemetry.stub_count, 1);
    }

    #[test]
    fn keyword_trigger_hydrates_a_medium_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        store
            .put(Scope::Task, "quote_me", "verbatim text".into(), None, Default::default(), Some("text/plain".to_string()))
            .unwrap();
        let plan = ContextPlan {
            instruction_tags: vec![],
            artifacts: vec![PlannedArtifact {
                key: "quote_me".into(),
                scope: Scope::Task,
                reason: "needs to be inserted verbatim".into(),
            }],
            include_project_summary: false,
            reasoning: "test".into(),
            raw_response: None,
        };
        let catalog = vec![candidate("quote_me", 4800)];
        let rendered = render_auto_loaded_context(&plan, &catalog, &store, None, false, &RendererConfig::default());
        assert_eq!(rendered.telemetry.hydrated_count, 1);
    }

    #[test]
    fn forced_for_tool_always_hydrates() {
        let candidate = ArtifactCandidate {
            metadata: json!({"forced_for_tool": "create_document"}).as_object().unwrap().clone(),
            ..candidate("forced", 999_999)
        };
        assert!(should_hydrate(&candidate, "no trigger words here", false));
    }

    #[test]
    fn project_summary_included_when_flagged() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        let summary = "already trimmed by the planner";
        let plan = ContextPlan {
            instruction_tags: vec![],
            artifacts: vec![],
            include_project_summary: true,
            reasoning: "".into(),
            raw_response: None,
        };
        let config = RendererConfig::default();
        let rendered = render_auto_loaded_context(&plan, &[], &store, Some(summary), false, &config);
        let block = rendered.block.unwrap();
        assert!(block.contains("## Project Summary"));
        assert!(block.contains(summary));
    }

    #[test]
    fn project_summary_omitted_when_not_flagged() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        let plan = ContextPlan::empty("no selections");
        let config = RendererConfig::default();
        let rendered = render_auto_loaded_context(&plan, &[], &store, Some("summary text"), false, &config);
        assert!(rendered.block.is_none());
    }
}
