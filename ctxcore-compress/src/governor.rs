//! Token Governor (§4.8): a pure advisory-insertion gate. It never drops
//! content, only prepends system-role directives once the prepared turn
//! crosses size thresholds.

use ctxcore_core::{GovernorConfig, Message, Role, TokenCounter};

const ADVISORY_DIRECTIVE: &str =
    "This conversation is getting large. Prefer fetching stored context via the \
     memory_fetch tool over re-reading or re-pasting long content inline.";

const STRICT_DIRECTIVE: &str =
    "You MUST use the memory_fetch tool to retrieve specific slices; do NOT \
     request full memories; always use tight line ranges (\u{2264}200 lines) or \
     byte ranges (\u{2264}64 KB).";

/// Prepend an advisory or strict directive message ahead of `messages` when
/// their combined token count crosses the configured thresholds. Returns the
/// directive actually inserted, if any. `messages` is otherwise untouched:
/// nothing is ever removed or rewritten here.
pub fn apply_governor(
    messages: &mut Vec<Message>,
    config: &GovernorConfig,
    counter: &dyn TokenCounter,
) -> Option<&'static str> {
    let total_tokens: u64 = messages
        .iter()
        .map(|m| counter.count(&m.content.as_text()) as u64)
        .sum();

    let directive = if total_tokens > config.strict_threshold {
        Some(STRICT_DIRECTIVE)
    } else if total_tokens > config.advisory_threshold {
        Some(ADVISORY_DIRECTIVE)
    } else {
        None
    };

    if let Some(text) = directive {
        messages.insert(0, Message::new(Role::System, text));
    }

    directive
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxcore_core::CharRatioCounter;

    fn messages_of_tokens(tokens: u64) -> Vec<Message> {
        // chars/4 ceiling, so tokens*4 chars produces exactly `tokens` tokens.
        vec![Message::new(Role::User, "a".repeat((tokens * 4) as usize))]
    }

    #[test]
    fn below_advisory_threshold_is_untouched() {
        let mut messages = messages_of_tokens(100);
        let config = GovernorConfig::default();
        let counter = CharRatioCounter;
        let directive = apply_governor(&mut messages, &config, &counter);
        assert!(directive.is_none());
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn above_advisory_threshold_prepends_soft_directive() {
        let mut messages = messages_of_tokens(25_000);
        let config = GovernorConfig::default();
        let counter = CharRatioCounter;
        let directive = apply_governor(&mut messages, &config, &counter);
        assert_eq!(directive, Some(ADVISORY_DIRECTIVE));
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0].role, Role::System));
    }

    #[test]
    fn above_strict_threshold_prepends_must_use_directive() {
        let mut messages = messages_of_tokens(45_000);
        let config = GovernorConfig::default();
        let counter = CharRatioCounter;
        let directive = apply_governor(&mut messages, &config, &counter);
        assert_eq!(directive, Some(STRICT_DIRECTIVE));
        assert!(messages[0].content.as_text().contains("MUST use"));
    }

    #[test]
    fn never_removes_existing_content() {
        let mut messages = messages_of_tokens(45_000);
        let before_len = messages.len();
        let config = GovernorConfig::default();
        let counter = CharRatioCounter;
        apply_governor(&mut messages, &config, &counter);
        assert_eq!(messages.len(), before_len + 1);
    }
}
