//! Content truncation helpers shared by the compressor's role passes.

use serde_json::Value;

/// Truncate `content` to at most `max_length` chars, preserving head and
/// tail around a centered marker. Unchanged if already short enough.
pub fn safe_truncate(content: &str, max_length: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_length {
        return content.to_string();
    }

    let max_length = max_length.min(100_000);
    let keep_length = max_length.saturating_sub(150);
    let head_len = keep_length / 2;
    let tail_len = keep_length - head_len;

    let head: String = chars[..head_len.min(chars.len())].iter().collect();
    let tail_start = chars.len().saturating_sub(tail_len);
    let tail: String = chars[tail_start..].iter().collect();

    format!(
        "{head}\n\n... (middle truncated — original was {} chars) ...\n\n{tail}",
        chars.len()
    )
}

/// Same as `safe_truncate`, but for structured content: serializes to JSON
/// first, then applies the identical char-based logic.
pub fn safe_truncate_value(value: &Value, max_length: usize) -> String {
    let serialized = serde_json::to_string(value).unwrap_or_default();
    safe_truncate(&serialized, max_length)
}

/// Keep the first `head_chars` of `content`, then append a tail that points
/// back at the original message for later retrieval.
pub fn truncate_with_pointer_tail(content: &str, head_chars: usize, message_id: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let head_len = head_chars.min(chars.len());
    let head: String = chars[..head_len].iter().collect();
    format!(
        "{head}\n\n... [truncated; use the expand-message tool with message_id=\"{message_id}\" to retrieve the full content] ..."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_unchanged() {
        assert_eq!(safe_truncate("hello", 100), "hello");
    }

    #[test]
    fn long_content_is_truncated_with_marker() {
        let content = "x".repeat(1000);
        let result = safe_truncate(&content, 200);
        assert!(result.contains("middle truncated"));
        assert!(result.len() < content.len());
        assert!(result.starts_with('x'));
        assert!(result.ends_with('x'));
    }

    #[test]
    fn clamps_at_100_000_chars() {
        let content = "y".repeat(500_000);
        let result = safe_truncate(&content, 400_000);
        // keep_length capped via the 100_000 ceiling, so the result is much
        // shorter than the requested max_length.
        assert!(result.chars().count() < 110_000);
    }

    #[test]
    fn pointer_tail_references_message_id() {
        let result = truncate_with_pointer_tail(&"z".repeat(50), 10, "msg-42");
        assert!(result.starts_with(&"z".repeat(10)));
        assert!(result.contains("msg-42"));
        assert!(result.contains("expand-message"));
    }
}
