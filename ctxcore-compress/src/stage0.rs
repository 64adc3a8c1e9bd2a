//! Stage 0: meta-message normalization (§4.4).

use ctxcore_core::{Message, MessageContent};
use serde_json::Value;

/// Strip the `arguments` subfield from any message whose content is a JSON
/// object carrying `tool_execution`, in place. Output remains valid JSON.
pub fn normalize_meta_messages(messages: &mut [Message]) {
    for message in messages.iter_mut() {
        if let MessageContent::Structured(Value::Object(map)) = &mut message.content {
            if let Some(Value::Object(tool_execution)) = map.get_mut("tool_execution") {
                tool_execution.remove("arguments");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxcore_core::Role;

    #[test]
    fn strips_arguments_from_tool_execution() {
        let mut messages = vec![Message {
            role: Role::Tool,
            content: MessageContent::Structured(serde_json::json!({
                "tool_execution": {"name": "search", "arguments": {"q": "rust"}}
            })),
            message_id: None,
            metadata: None,
        }];
        normalize_meta_messages(&mut messages);
        let MessageContent::Structured(v) = &messages[0].content else {
            panic!("expected structured content");
        };
        assert!(v["tool_execution"].get("arguments").is_none());
        assert_eq!(v["tool_execution"]["name"], "search");
    }

    #[test]
    fn leaves_text_content_and_non_tool_objects_untouched() {
        let mut messages = vec![
            Message::new(Role::User, "plain text"),
            Message {
                role: Role::Assistant,
                content: MessageContent::Structured(serde_json::json!({"other": "shape"})),
                message_id: None,
                metadata: None,
            },
        ];
        let before = messages.clone();
        normalize_meta_messages(&mut messages);
        assert_eq!(messages, before);
    }
}
