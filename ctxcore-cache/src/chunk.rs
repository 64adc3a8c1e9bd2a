//! Step 3-4: chunking the historical portion into TTL-tagged synthetic
//! system messages (§4.7).

use ctxcore_core::{Message, Role, TokenCounter};

/// `max(12000, window * 0.075)`.
fn max_chunk_tokens(context_window: u64) -> u64 {
    12_000u64.max((context_window as f64 * 0.075).ceil() as u64)
}

/// Greedily split `historical` into at most `max_blocks` chunks, rotating
/// the target chunk size after each emission. Once only one block remains
/// available, everything left is merged into it.
pub fn chunk_historical(
    historical: &[Message],
    context_window: u64,
    max_blocks: usize,
    counter: &dyn TokenCounter,
) -> Vec<Vec<Message>> {
    if historical.is_empty() || max_blocks == 0 {
        return Vec::new();
    }

    let max_chunk = max_chunk_tokens(context_window);
    let mut remaining_tokens: u64 = historical
        .iter()
        .map(|m| counter.count(&m.content.as_text()) as u64)
        .sum();
    let mut remaining_blocks = max_blocks;
    let mut idx = 0;
    let mut chunks = Vec::new();

    while idx < historical.len() {
        if chunks.len() + 1 == max_blocks {
            chunks.push(historical[idx..].to_vec());
            break;
        }

        let target = 2_048u64.max(max_chunk.min(remaining_tokens.div_ceil(remaining_blocks as u64)));
        let mut chunk = Vec::new();
        let mut chunk_tokens = 0u64;
        while idx < historical.len() && (chunk.is_empty() || chunk_tokens < target) {
            let t = counter.count(&historical[idx].content.as_text()) as u64;
            chunk.push(historical[idx].clone());
            chunk_tokens += t;
            idx += 1;
        }

        remaining_tokens = remaining_tokens.saturating_sub(chunk_tokens);
        remaining_blocks = remaining_blocks.saturating_sub(1).max(1);
        chunks.push(chunk);
    }

    chunks
}

/// Render one chunk as a single synthetic system message: a deterministic
/// transcript of the chunk's messages.
pub fn render_chunk(chunk: &[Message]) -> Message {
    let mut text = String::from("Prior conversation context (cached block).\n");
    for message in chunk {
        let role = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        };
        text.push_str(&format!("{role}: {}\n", message.content.as_text()));
    }
    Message::new(Role::System, text)
}

/// TTL tier (seconds) selected by context-window size.
pub fn ttl_tier_seconds(context_window: u64) -> u64 {
    if context_window >= 2_000_000 {
        6 * 3_600
    } else if context_window >= 1_000_000 {
        4 * 3_600
    } else if context_window >= 400_000 {
        2 * 3_600
    } else {
        45 * 60
    }
}
