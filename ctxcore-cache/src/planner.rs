//! Top-level Prompt Cache Planner entry point (§4.7).

use ctxcore_core::{CacheConfig, Message, Role, TokenCounter};

use crate::chunk::{chunk_historical, render_chunk, ttl_tier_seconds};
use crate::model::{supports_explicit_caching, CacheControl, PlannedMessage};
use crate::split::{live_token_budget, split_live_historical};

const PERMANENT_SYSTEM_PROMPT_TOKEN_THRESHOLD: u64 = 512;
const MINIMUM_CONTEXT_WINDOW: u64 = 128_000;

/// Plan the cache layout for one turn. `messages` must carry no system-role
/// entries; the working system prompt is passed separately. Providers with
/// no explicit caching support get a plain `[system] + messages` pass-
/// through, none of it tagged.
pub fn plan_prompt_cache(
    system_prompt: &str,
    messages: &[Message],
    model: &str,
    context_window: u64,
    config: &CacheConfig,
    counter: &dyn TokenCounter,
) -> Vec<PlannedMessage> {
    if !supports_explicit_caching(model) {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            out.push(PlannedMessage::plain(Message::new(Role::System, system_prompt)));
        }
        out.extend(messages.iter().cloned().map(PlannedMessage::plain));
        return out;
    }

    let context_window = context_window.max(MINIMUM_CONTEXT_WINDOW);

    // Step 1: system prompt.
    let system_tokens = counter.count(system_prompt) as u64;
    let system_message = if system_tokens >= PERMANENT_SYSTEM_PROMPT_TOKEN_THRESHOLD {
        PlannedMessage::with_control(Message::new(Role::System, system_prompt), CacheControl::Permanent)
    } else {
        PlannedMessage::plain(Message::new(Role::System, system_prompt))
    };

    // Step 2: live/historical split.
    let live_budget = live_token_budget(context_window, config.live_token_floor, config.live_token_ceiling);
    let (historical, live) =
        split_live_historical(messages, live_budget, config.min_trailing_live_messages, counter);

    // Step 3-4: chunk historical into TTL-tagged blocks.
    let ttl_seconds = match config.ttl_override_hours {
        Some(hours) if hours > 0 => (hours as u64) * 3_600,
        _ => ttl_tier_seconds(context_window),
    };
    let chunks = chunk_historical(&historical, context_window, config.max_ttl_blocks, counter);
    let chunk_messages: Vec<PlannedMessage> = chunks
        .iter()
        .map(|chunk| {
            let rendered = render_chunk(chunk);
            if config.ttl_enforcement_disabled() {
                PlannedMessage::plain(rendered)
            } else {
                PlannedMessage::with_control(rendered, CacheControl::Ttl { max_ttl_seconds: ttl_seconds })
            }
        })
        .collect();

    // Step 5: final ordered list.
    let mut out = Vec::with_capacity(1 + chunk_messages.len() + live.len());
    out.push(system_message);
    out.extend(chunk_messages);
    out.extend(live.into_iter().map(PlannedMessage::plain));

    validate_cache_control_cap(&mut out, config.max_cache_control_messages);
    out
}

/// If more than `cap` messages carry a `cache_control` directive, strip it
/// from the oldest cached historical blocks first, never touching the
/// system prompt's own directive.
fn validate_cache_control_cap(planned: &mut [PlannedMessage], cap: usize) {
    let tagged_count = planned.iter().filter(|p| p.cache_control.is_some()).count();
    if tagged_count <= cap {
        return;
    }

    let mut to_strip = tagged_count - cap;
    for p in planned.iter_mut() {
        if to_strip == 0 {
            break;
        }
        // Index 0 is the system prompt; leave it alone and strip from the
        // historical chunk blocks that follow, oldest first.
        if matches!(p.message.role, Role::System) && p.cache_control == Some(CacheControl::Permanent) {
            continue;
        }
        if p.cache_control.is_some() {
            p.cache_control = None;
            to_strip -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxcore_core::CharRatioCounter;

    fn message(role: Role, chars: usize) -> Message {
        Message::new(role, "a".repeat(chars))
    }

    #[test]
    fn non_cache_capable_model_is_a_plain_pass_through() {
        let messages = vec![message(Role::User, 10)];
        let counter = CharRatioCounter;
        let planned = plan_prompt_cache("a short prompt", &messages, "gpt-4o-mini", 200_000, &CacheConfig::default(), &counter);
        assert!(planned.iter().all(|p| p.cache_control.is_none()));
        assert_eq!(planned.len(), 2);
    }

    #[test]
    fn large_system_prompt_gets_permanent_cache_control() {
        let messages = vec![message(Role::User, 10)];
        let counter = CharRatioCounter;
        let long_prompt = "x".repeat(3000);
        let planned = plan_prompt_cache(&long_prompt, &messages, "gemini-1.5-pro", 200_000, &CacheConfig::default(), &counter);
        assert_eq!(planned[0].cache_control, Some(CacheControl::Permanent));
    }

    #[test]
    fn small_system_prompt_is_untagged() {
        let messages = vec![message(Role::User, 10)];
        let counter = CharRatioCounter;
        let planned = plan_prompt_cache("short", &messages, "gemini-1.5-pro", 200_000, &CacheConfig::default(), &counter);
        assert!(planned[0].cache_control.is_none());
    }

    #[test]
    fn historical_messages_become_ttl_tagged_chunks() {
        let messages: Vec<Message> = (0..40).map(|_| message(Role::User, 4_000)).collect();
        let counter = CharRatioCounter;
        let planned = plan_prompt_cache("x".repeat(3000).as_str(), &messages, "gemini-1.5-pro", 200_000, &CacheConfig::default(), &counter);
        let ttl_tagged = planned
            .iter()
            .filter(|p| matches!(p.cache_control, Some(CacheControl::Ttl { .. })))
            .count();
        assert!(ttl_tagged > 0);
        assert!(ttl_tagged <= 3);
    }

    #[test]
    fn validation_pass_caps_total_tagged_messages_at_four() {
        let messages: Vec<Message> = (0..60).map(|_| message(Role::User, 4_000)).collect();
        let counter = CharRatioCounter;
        let config = CacheConfig {
            max_cache_control_messages: 2,
            ..CacheConfig::default()
        };
        let planned = plan_prompt_cache("x".repeat(3000).as_str(), &messages, "gemini-1.5-pro", 200_000, &config, &counter);
        let tagged = planned.iter().filter(|p| p.cache_control.is_some()).count();
        assert!(tagged <= 2);
    }

    #[test]
    fn ttl_enforcement_disabled_leaves_chunks_untagged() {
        let messages: Vec<Message> = (0..40).map(|_| message(Role::User, 4_000)).collect();
        let counter = CharRatioCounter;
        let config = CacheConfig {
            ttl_override_hours: Some(0),
            ..CacheConfig::default()
        };
        let planned = plan_prompt_cache("x".repeat(3000).as_str(), &messages, "gemini-1.5-pro", 200_000, &config, &counter);
        assert!(planned
            .iter()
            .all(|p| !matches!(p.cache_control, Some(CacheControl::Ttl { .. }))));
    }
}
