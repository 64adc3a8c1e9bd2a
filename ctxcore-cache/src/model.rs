//! Types shared by the cache planner's stages (§4.7).

use ctxcore_core::Message;

/// The provider-level caching directive attached to a planned message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    /// Never expires; used for the (stable) system prompt.
    Permanent,
    /// Expires after `max_ttl_seconds`; used for historical chunk blocks.
    Ttl { max_ttl_seconds: u64 },
}

/// A message paired with the cache directive the planner decided to attach
/// to it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMessage {
    pub message: Message,
    pub cache_control: Option<CacheControl>,
}

impl PlannedMessage {
    pub fn plain(message: Message) -> Self {
        Self {
            message,
            cache_control: None,
        }
    }

    pub fn with_control(message: Message, cache_control: CacheControl) -> Self {
        Self {
            message,
            cache_control: Some(cache_control),
        }
    }
}

/// Markers identifying the Gemini-family models that expose explicit
/// prompt caching (`cache_control` directives) in this core. Models outside
/// this set get the pass-through behavior: `[system] + messages`, untagged.
const CACHE_CAPABLE_MODEL_MARKERS: [&str; 2] = ["gemini", "flash"];

pub fn supports_explicit_caching(model: &str) -> bool {
    let lower = model.to_lowercase();
    CACHE_CAPABLE_MODEL_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_cache_capable_models() {
        assert!(supports_explicit_caching("gemini-1.5-pro"));
        assert!(supports_explicit_caching("gemini-2.0-flash"));
        assert!(!supports_explicit_caching("gpt-4o-mini"));
        assert!(!supports_explicit_caching("claude-opus-4"));
    }
}
