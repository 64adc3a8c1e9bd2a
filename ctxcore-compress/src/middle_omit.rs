//! Stage 4 (fallback) and Stage 5 (hard cap) of the compressor (§4.4).

use ctxcore_core::{CompressConfig, Message};

/// Stage 4: once the recursion budget is exhausted and the conversation is
/// still over ceiling, drop a fixed batch of messages at a time from the
/// middle of the list until `is_over_ceiling` reports false, or the
/// iteration/minimum-kept limits are hit. Too few messages to meaningfully
/// middle-elide falls back to dropping from the earliest half.
pub fn middle_omit(
    mut messages: Vec<Message>,
    config: &CompressConfig,
    is_over_ceiling: impl Fn(&[Message]) -> bool,
) -> Vec<Message> {
    let mut iterations = 0;
    while is_over_ceiling(&messages) && iterations < config.middle_omit_max_iterations {
        if messages.len() <= config.middle_omit_min_kept {
            break;
        }
        let removable = messages.len() - config.middle_omit_min_kept;
        let batch = config.middle_omit_batch.min(removable);
        if batch == 0 {
            break;
        }

        if messages.len() >= config.middle_omit_min_kept * 2 {
            let mid = messages.len() / 2;
            let start = mid.saturating_sub(batch / 2);
            let end = (start + batch).min(messages.len());
            messages.drain(start..end);
        } else {
            let earliest_half = (messages.len() / 2).max(1);
            let end = batch.min(earliest_half);
            messages.drain(0..end);
        }
        iterations += 1;
    }
    messages
}

/// Stage 5: unconditional hard cap on message count, keeping `cap/2` from
/// the start and the rest from the end.
pub fn apply_message_count_cap(messages: Vec<Message>, cap: usize) -> Vec<Message> {
    if messages.len() <= cap {
        return messages;
    }
    let keep_start = cap / 2;
    let keep_end = cap - keep_start;
    let total = messages.len();

    let mut out = Vec::with_capacity(cap);
    out.extend_from_slice(&messages[..keep_start]);
    out.extend_from_slice(&messages[total - keep_end..]);
    out
}
