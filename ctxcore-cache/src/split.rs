//! Step 2: live/historical split (§4.7).

use ctxcore_core::{Message, TokenCounter};

/// The live budget in tokens: `max(floor, ceil(window * 0.07))`, capped at
/// `max(16384, window * 0.12)` and at the configured hard ceiling.
pub fn live_token_budget(context_window: u64, floor: u64, hard_ceiling: u64) -> u64 {
    let soft_floor = floor.max((context_window as f64 * 0.07).ceil() as u64);
    let dynamic_cap = 16_384u64.max((context_window as f64 * 0.12).ceil() as u64);
    soft_floor.min(dynamic_cap).min(hard_ceiling)
}

/// Walk from newest to oldest, keeping messages live until the next one
/// would exceed `live_budget`, provided at least `min_live` are already
/// live. Returns `(historical, live)`, both in original chronological order.
pub fn split_live_historical(
    messages: &[Message],
    live_budget: u64,
    min_live: usize,
    counter: &dyn TokenCounter,
) -> (Vec<Message>, Vec<Message>) {
    let mut live_count = 0usize;
    let mut tokens = 0u64;

    for message in messages.iter().rev() {
        let t = counter.count(&message.content.as_text()) as u64;
        if live_count >= min_live && tokens + t > live_budget {
            break;
        }
        tokens += t;
        live_count += 1;
    }

    let split_at = messages.len().saturating_sub(live_count);
    (messages[..split_at].to_vec(), messages[split_at..].to_vec())
}
