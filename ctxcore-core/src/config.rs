//! Aggregate runtime configuration, built with the same
//! `Default` + `from_env()` overlay pattern the rest of the ambient stack
//! uses for its configuration structs.

use std::env;

/// Content Offloader tuning (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct OffloadConfig {
    pub token_threshold: u64,
    pub char_threshold: u64,
    pub min_chars: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            token_threshold: 300,
            char_threshold: 1500,
            min_chars: 100,
        }
    }
}

/// Message Compressor tuning (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct CompressConfig {
    pub tool_result_token_threshold: u64,
    pub recursion_budget: u32,
    pub middle_omit_batch: usize,
    pub middle_omit_min_kept: usize,
    pub middle_omit_max_iterations: u32,
    pub message_count_cap: usize,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            tool_result_token_threshold: 4096,
            recursion_budget: 5,
            middle_omit_batch: 10,
            middle_omit_min_kept: 10,
            middle_omit_max_iterations: 500,
            message_count_cap: 320,
        }
    }
}

/// Context Planner tuning (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub max_instructions: usize,
    pub max_artifacts: usize,
    pub artifact_catalog_cap: usize,
    pub project_summary_preview_chars: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_instructions: 3,
            max_artifacts: 3,
            artifact_catalog_cap: 8,
            project_summary_preview_chars: 400,
        }
    }
}

/// Retrieval Renderer tuning (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub stub_summary_chars_aggressive: usize,
    pub stub_summary_chars_normal: usize,
    pub hydrated_excerpt_chars_aggressive: usize,
    pub hydrated_excerpt_chars_normal: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            stub_summary_chars_aggressive: 280,
            stub_summary_chars_normal: 480,
            hydrated_excerpt_chars_aggressive: 1500,
            hydrated_excerpt_chars_normal: 4000,
        }
    }
}

/// Prompt Cache Planner tuning (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_ttl_blocks: usize,
    pub ttl_seconds: u64,
    pub live_token_floor: u64,
    pub live_token_ceiling: u64,
    pub min_trailing_live_messages: usize,
    pub max_cache_control_messages: usize,
    /// `KV_CACHE_TTL_OVERRIDE_HOURS`: values `<= 0` disable TTL enforcement
    /// globally.
    pub ttl_override_hours: Option<i64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_ttl_blocks: 3,
            ttl_seconds: 14_400,
            live_token_floor: 4_096,
            live_token_ceiling: 120_000,
            min_trailing_live_messages: 4,
            max_cache_control_messages: 4,
            ttl_override_hours: None,
        }
    }
}

/// Token Governor tuning (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorConfig {
    pub advisory_threshold: u64,
    pub strict_threshold: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            advisory_threshold: 20_000,
            strict_threshold: 40_000,
        }
    }
}

/// Optional embedding-service settings, honored by planner cache naming but
/// otherwise out of this core's scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingsConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Top-level aggregate configuration for the whole core.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextCoreConfig {
    pub offload: OffloadConfig,
    pub compress: CompressConfig,
    pub planner: PlannerConfig,
    pub renderer: RendererConfig,
    pub cache: CacheConfig,
    pub governor: GovernorConfig,
    pub embeddings: EmbeddingsConfig,
}

impl ContextCoreConfig {
    /// Start from `Default::default()` and overlay recognized environment
    /// variables, mirroring the api crate's `Config::from_env` overlay
    /// pattern: unset or unparsable variables silently keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("KV_CACHE_TTL_OVERRIDE_HOURS") {
            if let Ok(hours) = raw.trim().parse::<i64>() {
                config.cache.ttl_override_hours = Some(hours);
            }
        }

        if let Ok(provider) = env::var("EMBEDDINGS_PROVIDER") {
            if !provider.trim().is_empty() {
                config.embeddings.provider = Some(provider);
            }
        }

        if let Ok(model) = env::var("EMBEDDINGS_MODEL") {
            if !model.trim().is_empty() {
                config.embeddings.model = Some(model);
            }
        }

        config
    }
}

impl CacheConfig {
    /// True if `KV_CACHE_TTL_OVERRIDE_HOURS` was set to a value `<= 0`.
    pub fn ttl_enforcement_disabled(&self) -> bool {
        matches!(self.ttl_override_hours, Some(h) if h <= 0)
    }
}
