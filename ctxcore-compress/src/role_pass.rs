//! Stage 2: the three independent, idempotent role passes (§4.4).

use ctxcore_core::{Message, TokenCounter};

use crate::safe_truncate::{safe_truncate, truncate_with_pointer_tail};

/// Apply one role pass in place. `predicate` selects which messages this
/// pass targets (tool-result, `role=user`, or `role=assistant`); the most
/// recent match gets a symmetric safe-truncate, every earlier match gets a
/// head-plus-pointer-tail truncation. Messages under `token_threshold` are
/// left alone. When `pointer_mode` is set, messages carrying
/// `metadata.memory_refs` are skipped entirely.
pub fn compress_role_pass(
    messages: &mut [Message],
    predicate: impl Fn(&Message) -> bool,
    token_threshold: u64,
    max_tokens: u64,
    pointer_mode: bool,
    counter: &dyn TokenCounter,
) {
    let most_recent_idx = messages.iter().rposition(|m| predicate(m));

    for (idx, message) in messages.iter_mut().enumerate() {
        if !predicate(message) {
            continue;
        }
        if pointer_mode && message.has_memory_refs() {
            continue;
        }

        let text = message.content.as_text();
        let tokens = counter.count(&text) as u64;
        if tokens < token_threshold {
            continue;
        }

        let new_text = if Some(idx) == most_recent_idx {
            safe_truncate(&text, (2 * max_tokens) as usize)
        } else {
            let message_id = message.message_id.clone().unwrap_or_default();
            let head_chars = (3 * token_threshold) as usize;
            truncate_with_pointer_tail(&text, head_chars, &message_id)
        };

        message.content = ctxcore_core::MessageContent::Text(new_text);
    }
}
