//! Step 3 of the turn pipeline (§4.9): opportunistic prefetch of memory
//! references that look relevant to the current user message.

use std::collections::HashSet;

use ctxcore_core::{Message, MessageMetadata, Role};
use ctxcore_store::MemoryStore;
use serde_json::json;

const MAX_PREFETCH: usize = 3;
const PREFETCH_SLICE_LINES: usize = 120;
const MIN_SHARED_TOKEN_LEN: usize = 4;
const RECENT_WINDOW: usize = 20;

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_SHARED_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

fn shares_token(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    a.intersection(b).next().is_some()
}

/// Scan the last 20 messages for `memory_refs`; prefetch up to 3 whose
/// title shares a token of at least 4 characters with the current user
/// message. Individual fetch failures are swallowed, matching the
/// soft-budget/best-effort nature of this step.
pub fn prefetch_relevant_memory_refs(
    thread_messages: &[Message],
    user_message: &str,
    store: &MemoryStore,
) -> Vec<Message> {
    let user_tokens = tokenize(user_message);
    if user_tokens.is_empty() {
        return Vec::new();
    }

    let recent = thread_messages
        .iter()
        .rev()
        .take(RECENT_WINDOW)
        .collect::<Vec<_>>();

    let mut prefetched = Vec::new();
    for message in recent {
        if prefetched.len() >= MAX_PREFETCH {
            break;
        }
        let Some(metadata) = &message.metadata else { continue };
        for memory_ref in &metadata.memory_refs {
            if prefetched.len() >= MAX_PREFETCH {
                break;
            }
            let title_tokens = tokenize(&memory_ref.title);
            if !shares_token(&user_tokens, &title_tokens) {
                continue;
            }

            match store.get_slice(&memory_ref.id, 0, PREFETCH_SLICE_LINES) {
                Ok(slice) => {
                    let tagged = Message::new(Role::System, format!("Prefetched memory \"{}\":\n{slice}", memory_ref.title))
                        .with_metadata(MessageMetadata {
                            extra: json!({"prefetched": true, "memory_id": memory_ref.id})
                                .as_object()
                                .cloned()
                                .unwrap_or_default(),
                            ..Default::default()
                        });
                    prefetched.push(tagged);
                }
                Err(e) => {
                    tracing::debug!(memory_id = %memory_ref.id, error = %e, "prefetch slice fetch failed, skipping");
                }
            }
        }
    }
    prefetched
}
