//! The inverse of offloading: replacing pointer references back with their
//! full content (§4.2 "Expand operation").

use std::sync::Arc;

use ctxcore_core::{Message, MessageContent, Scope};
use ctxcore_store::{ArtifactStore, AsType, RetrievedValue};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

/// True if `value` is a pointer reference (`_cached=true` with `artifact_key`
/// set), recognized at any depth: a top-level object, nested inside another
/// object's field, or an element of an array (content-block lists included).
fn any_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => is_reference_node(map) || map.values().any(any_reference),
        Value::Array(items) => items.iter().any(any_reference),
        _ => false,
    }
}

fn content_has_reference(content: &MessageContent) -> bool {
    match content {
        MessageContent::Structured(v) => any_reference(v),
        MessageContent::Text(_) => false,
    }
}

fn is_reference_node(map: &Map<String, Value>) -> bool {
    map.get("_cached").and_then(Value::as_bool) == Some(true) && map.get("artifact_key").and_then(Value::as_str).is_some()
}

fn reference_from_node(map: &Map<String, Value>) -> Option<(String, Scope)> {
    if !is_reference_node(map) {
        return None;
    }
    let key = map.get("artifact_key")?.as_str()?.to_string();
    let scope: Scope = map.get("scope")?.as_str()?.parse().ok()?;
    Some((key, scope))
}

/// §4.2 expand operation. Rewrites the last `recent_message_count` messages
/// (or all of them, if `expand_recent_only` is false) by recursively
/// replacing any `_cached` pointer node (however deeply nested in the
/// message's structured content) with the full content fetched from the
/// store. Earlier messages are left untouched. A fast path scans for any
/// reference before doing I/O; per-reference fetch failures leave that node
/// unchanged rather than failing the whole message or batch.
pub async fn expand_cached_references(
    store: &Arc<ArtifactStore>,
    mut messages: Vec<Message>,
    auto_expand: bool,
    expand_recent_only: bool,
    recent_message_count: usize,
) -> Vec<Message> {
    if !auto_expand || messages.is_empty() {
        return messages;
    }

    let split_at = if expand_recent_only {
        messages.len().saturating_sub(recent_message_count)
    } else {
        0
    };

    let any_reference = messages[split_at..].iter().any(|m| content_has_reference(&m.content));
    if !any_reference {
        return messages;
    }

    let tail = messages.split_off(split_at);
    let fetches = tail.into_iter().map(|message| {
        let store = Arc::clone(store);
        async move { expand_one(store, message).await }
    });

    let expanded = futures_util::future::join_all(fetches).await;
    messages.extend(expanded);
    messages
}

async fn expand_one(store: Arc<ArtifactStore>, message: Message) -> Message {
    let MessageContent::Structured(value) = message.content else {
        return message;
    };
    let expanded = expand_value(store, value).await;
    let content = match expanded {
        // A whole-content pointer collapses straight to text, matching what
        // the store handed back rather than re-wrapping it as structured.
        Value::String(s) => MessageContent::Text(s),
        other => MessageContent::Structured(other),
    };
    Message { content, ..message }
}

fn expand_value(store: Arc<ArtifactStore>, value: Value) -> BoxFuture<'static, Value> {
    Box::pin(async move {
        match value {
            Value::Object(map) => {
                if let Some((key, scope)) = reference_from_node(&map) {
                    match fetch_replacement(&store, scope, &key).await {
                        Some(replacement) => replacement,
                        None => Value::Object(map),
                    }
                } else {
                    let mut expanded = Map::with_capacity(map.len());
                    for (field, field_value) in map {
                        expanded.insert(field, expand_value(Arc::clone(&store), field_value).await);
                    }
                    Value::Object(expanded)
                }
            }
            Value::Array(items) => {
                let mut expanded = Vec::with_capacity(items.len());
                for item in items {
                    expanded.push(expand_value(Arc::clone(&store), item).await);
                }
                Value::Array(expanded)
            }
            other => other,
        }
    })
}

async fn fetch_replacement(store: &Arc<ArtifactStore>, scope: Scope, key: &str) -> Option<Value> {
    let store = Arc::clone(store);
    let key = key.to_string();
    let result = tokio::task::spawn_blocking(move || store.get(scope, &key, AsType::Auto)).await;
    match result {
        Ok(Ok(RetrievedValue::Str(s))) => Some(Value::String(s)),
        Ok(Ok(RetrievedValue::Dict(v))) => Some(v),
        Ok(Ok(RetrievedValue::Bytes(_))) => None,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "failed to expand cached reference, leaving node unchanged");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "expand task panicked, leaving node unchanged");
            None
        }
    }
}
