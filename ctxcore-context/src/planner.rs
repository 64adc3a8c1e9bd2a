//! Context Planner (§4.5): decides which instruction bundles and offloaded
//! artifacts get hydrated into the next prompt, via a small LLM call with a
//! deterministic keyword fallback.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use ctxcore_core::{ArtifactCandidate, ContextPlan, InstructionCandidate, PlannerConfig, PlannedArtifact, Scope};
use ctxcore_llm::{ChatRequest, LlmTransport};
use serde_json::{json, Value};

const PLANNER_MODEL_TEMPERATURE: f32 = 0.1;
const PLANNER_MODEL_MAX_TOKENS: u32 = 250;

/// Ordered keyword groups driving the deterministic fallback. Order matters:
/// the fallback emits the first `max_instructions` matches in this order.
const KEYWORD_GROUPS: &[(&str, &[&str])] = &[
    ("presentation", &["presentation", "slide", "slides", "deck"]),
    ("document_creation", &["document", "report"]),
    ("research", &["research", "investigate"]),
    ("visualization", &["chart", "graph"]),
    ("web_development", &["website", "web app", "web-app", "webapp", "deploy"]),
];

/// Everything the planner needs for one turn.
pub struct PlannerInputs<'a> {
    pub user_request: &'a str,
    pub instruction_catalog: &'a [InstructionCandidate],
    pub artifact_catalog: &'a [ArtifactCandidate],
    pub project_summary_preview: Option<&'a str>,
    pub recent_context_hint: Option<&'a str>,
    pub aggressive_mode: bool,
}

/// Produce a `ContextPlan` for this turn. Any model failure or empty/garbled
/// output falls back to the deterministic keyword plan; the caller never
/// sees a planner error.
pub async fn plan_context(
    inputs: &PlannerInputs<'_>,
    transport: &dyn LlmTransport,
    planner_model: &str,
    config: &PlannerConfig,
) -> ContextPlan {
    let payload = build_payload(inputs, config);
    let request = ChatRequest {
        messages: vec![ctxcore_core::Message::new(
            ctxcore_core::Role::User,
            serde_json::to_string(&payload).unwrap_or_default(),
        )],
        model: planner_model.to_string(),
        temperature: PLANNER_MODEL_TEMPERATURE,
        max_tokens: PLANNER_MODEL_MAX_TOKENS,
        tools: None,
        tool_choice: None,
        stream: false,
    };

    let raw = match transport.chat(request).await {
        Ok(response) if !response.content.trim().is_empty() => response.content,
        Ok(_) => {
            tracing::debug!("planner returned empty response, falling back to keyword plan");
            return keyword_fallback(inputs, config);
        }
        Err(e) => {
            tracing::warn!(error = %e, "planner call failed, falling back to keyword plan");
            return keyword_fallback(inputs, config);
        }
    };

    match extract_json_object(&raw).and_then(|v| parse_model_plan(&v, &raw)) {
        Some(plan) => {
            let sanitized = sanitize(plan, inputs, config);
            apply_invariants(sanitized)
        }
        None => {
            tracing::debug!("planner response was not valid JSON, falling back to keyword plan");
            keyword_fallback(inputs, config)
        }
    }
}

fn build_payload(inputs: &PlannerInputs<'_>, config: &PlannerConfig) -> Value {
    json!({
        "user_request": inputs.user_request,
        "instruction_catalog": inputs.instruction_catalog,
        "artifact_catalog": inputs.artifact_catalog,
        "project_summary_preview": inputs.project_summary_preview,
        "recent_context_hint": inputs.recent_context_hint,
        "aggressive_mode": inputs.aggressive_mode,
        "limits": {
            "max_instructions": config.max_instructions,
            "max_artifacts": config.max_artifacts,
        },
    })
}

/// Scan `text` for the first balanced `{...}` substring and parse it as JSON.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..=offset];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

struct RawPlan {
    instructions: Vec<(String, String)>,
    artifacts: Vec<(String, String, String)>,
    include_project_summary: bool,
    reasoning: String,
}

fn parse_model_plan(value: &Value, raw_response: &str) -> Option<RawPlan> {
    let obj = value.as_object()?;

    let instructions = obj
        .get("instructions")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let tag = item.get("tag")?.as_str()?.to_string();
                    let reason = item.get("reason").and_then(Value::as_str).unwrap_or("").to_string();
                    Some((tag, reason))
                })
                .collect()
        })
        .unwrap_or_default();

    let artifacts = obj
        .get("artifacts")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let key = item.get("key")?.as_str()?.to_string();
                    let scope = item
                        .get("scope")
                        .and_then(Value::as_str)
                        .unwrap_or("artifacts")
                        .to_string();
                    let reason = item.get("reason").and_then(Value::as_str).unwrap_or("").to_string();
                    Some((key, scope, reason))
                })
                .collect()
        })
        .unwrap_or_default();

    let include_project_summary = obj
        .get("include_project_summary")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let _ = raw_response;
    Some(RawPlan {
        instructions,
        artifacts,
        include_project_summary,
        reasoning,
    })
}

fn sanitize(raw: RawPlan, inputs: &PlannerInputs<'_>, config: &PlannerConfig) -> ContextPlan {
    let known_tags: HashSet<&str> = inputs.instruction_catalog.iter().map(|c| c.tag.as_str()).collect();
    let known_artifacts: HashMap<(Scope, &str), ()> = inputs
        .artifact_catalog
        .iter()
        .map(|a| ((a.scope, a.key.as_str()), ()))
        .collect();

    let instruction_tags: Vec<String> = raw
        .instructions
        .into_iter()
        .filter(|(tag, _)| known_tags.contains(tag.as_str()))
        .take(config.max_instructions)
        .map(|(tag, _)| tag)
        .collect();

    let artifacts: Vec<PlannedArtifact> = raw
        .artifacts
        .into_iter()
        .filter_map(|(key, scope_str, reason)| {
            let scope = Scope::from_str(&scope_str).unwrap_or(Scope::Artifacts);
            if known_artifacts.contains_key(&(scope, key.as_str())) {
                Some(PlannedArtifact { key, scope, reason })
            } else {
                None
            }
        })
        .take(config.max_artifacts)
        .collect();

    ContextPlan {
        instruction_tags,
        artifacts,
        include_project_summary: raw.include_project_summary,
        reasoning: raw.reasoning,
        raw_response: None,
    }
}

/// I6: if `document_creation` was selected without `visualization`, append it.
fn apply_invariants(mut plan: ContextPlan) -> ContextPlan {
    if plan.instruction_tags.iter().any(|t| t == "document_creation")
        && !plan.instruction_tags.iter().any(|t| t == "visualization")
    {
        plan.instruction_tags.push("visualization".to_string());
    }
    plan
}

fn keyword_fallback(inputs: &PlannerInputs<'_>, config: &PlannerConfig) -> ContextPlan {
    let lowered = inputs.user_request.to_lowercase();
    let known_tags: HashSet<&str> = inputs.instruction_catalog.iter().map(|c| c.tag.as_str()).collect();

    let mut instruction_tags = Vec::new();
    for (tag, keywords) in KEYWORD_GROUPS {
        if instruction_tags.len() >= config.max_instructions {
            break;
        }
        if !known_tags.is_empty() && !known_tags.contains(tag) {
            continue;
        }
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            instruction_tags.push(tag.to_string());
        }
    }

    let plan = ContextPlan {
        instruction_tags,
        artifacts: Vec::new(),
        include_project_summary: false,
        reasoning: "Fallback keyword heuristic".to_string(),
        raw_response: None,
    };
    apply_invariants(plan)
}
