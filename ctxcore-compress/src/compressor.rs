//! Top-level entry point wiring Stage 0 through Stage 5 together (§4.4).

use ctxcore_core::{CompressConfig, Message, TokenCounter};

use crate::budget::effective_max_tokens;
use crate::middle_omit::{apply_message_count_cap, middle_omit};
use crate::role_pass::compress_role_pass;
use crate::stage0::normalize_meta_messages;

/// Stats collected while compressing a turn's message list, returned when
/// `return_report=true`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub messages_before: usize,
    pub messages_after: usize,
    pub recursion_attempts: u32,
    pub middle_omit_iterations: u32,
    pub summary: String,
}

/// Sum of token counts across `system_prompt` (if any) and every message's
/// text content.
fn count_total(messages: &[Message], system_prompt: Option<&str>, counter: &dyn TokenCounter) -> u64 {
    let system_tokens = system_prompt.map(|s| counter.count(s) as u64).unwrap_or(0);
    let messages_tokens: u64 = messages
        .iter()
        .map(|m| counter.count(&m.content.as_text()) as u64)
        .sum();
    system_tokens + messages_tokens
}

/// Run the full six-stage compression pipeline over `messages` in place,
/// returning an optional report when the caller asked for one.
#[allow(clippy::too_many_arguments)]
pub fn compress(
    messages: &mut Vec<Message>,
    system_prompt: Option<&str>,
    context_window: u64,
    max_tokens_override: Option<u64>,
    pointer_mode: bool,
    config: &CompressConfig,
    counter: &dyn TokenCounter,
    return_report: bool,
) -> Option<CompressionReport> {
    let messages_before = messages.len();
    let tokens_before = count_total(messages, system_prompt, counter);

    // Stage 0: meta-message normalization.
    normalize_meta_messages(messages);

    // Stage 1: derive the effective ceiling for this turn.
    let max_tokens = effective_max_tokens(context_window, max_tokens_override);

    // Stage 2: three independent role passes at the configured threshold.
    let mut token_threshold = config.tool_result_token_threshold;
    run_role_passes(messages, token_threshold, max_tokens, pointer_mode, counter);

    // Stage 3: halve the threshold and re-run while over ceiling and budget
    // remains.
    let mut recursion_attempts = 0;
    while recursion_attempts < config.recursion_budget
        && count_total(messages, system_prompt, counter) > max_tokens
    {
        token_threshold = (token_threshold / 2).max(1);
        run_role_passes(messages, token_threshold, max_tokens, pointer_mode, counter);
        recursion_attempts += 1;
    }

    // Stage 4: middle-omit fallback if recursion alone wasn't enough.
    let mut middle_omit_iterations = 0;
    if count_total(messages, system_prompt, counter) > max_tokens {
        tracing::debug!(
            recursion_attempts,
            tokens = count_total(messages, system_prompt, counter),
            max_tokens,
            "recursion budget exhausted, falling back to middle-omit"
        );
        let before_len = messages.len();
        let taken = std::mem::take(messages);
        let reduced = middle_omit(taken, config, |msgs| {
            count_total(msgs, system_prompt, counter) > max_tokens
        });
        middle_omit_iterations = before_len.saturating_sub(reduced.len()) as u32 / config.middle_omit_batch.max(1) as u32;
        *messages = reduced;
    }

    // Stage 5: unconditional hard cap on message count.
    let taken = std::mem::take(messages);
    *messages = apply_message_count_cap(taken, config.message_count_cap);

    if !return_report {
        return None;
    }

    let tokens_after = count_total(messages, system_prompt, counter);
    let messages_after = messages.len();
    Some(CompressionReport {
        tokens_before,
        tokens_after,
        messages_before,
        messages_after,
        recursion_attempts,
        middle_omit_iterations,
        summary: format!(
            "{tokens_before} -> {tokens_after} tokens, {messages_before} -> {messages_after} messages \
             ({recursion_attempts} recursion passes, {middle_omit_iterations} middle-omit iterations)"
        ),
    })
}

fn run_role_passes(
    messages: &mut [Message],
    token_threshold: u64,
    max_tokens: u64,
    pointer_mode: bool,
    counter: &dyn TokenCounter,
) {
    compress_role_pass(messages, Message::is_tool_result, token_threshold, max_tokens, pointer_mode, counter);
    compress_role_pass(
        messages,
        |m| matches!(m.role, ctxcore_core::Role::User) && !m.is_tool_result(),
        token_threshold,
        max_tokens,
        pointer_mode,
        counter,
    );
    compress_role_pass(
        messages,
        |m| matches!(m.role, ctxcore_core::Role::Assistant),
        token_threshold,
        max_tokens,
        pointer_mode,
        counter,
    );
}
