//! Stage 1: context-window budgeting (§4.4).

/// Tiered reserve subtracted from the raw context window to leave headroom
/// for the model's own reply.
pub fn tier_reserve(context_window: u64) -> u64 {
    if context_window >= 1_000_000 {
        300_000
    } else if context_window >= 400_000 {
        64_000
    } else if context_window >= 200_000 {
        32_000
    } else if context_window >= 100_000 {
        16_000
    } else {
        8_000
    }
}

/// The effective `max_tokens` ceiling the compressor shrinks against: the
/// caller's override if given, otherwise the context window minus its tier
/// reserve.
pub fn effective_max_tokens(context_window: u64, max_tokens_override: Option<u64>) -> u64 {
    max_tokens_override.unwrap_or_else(|| context_window.saturating_sub(tier_reserve(context_window)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_reserve_matches_required_table() {
        assert_eq!(tier_reserve(1_500_000), 300_000);
        assert_eq!(tier_reserve(1_000_000), 300_000);
        assert_eq!(tier_reserve(500_000), 64_000);
        assert_eq!(tier_reserve(250_000), 32_000);
        assert_eq!(tier_reserve(150_000), 16_000);
        assert_eq!(tier_reserve(32_000), 8_000);
    }

    #[test]
    fn override_takes_precedence_over_context_window() {
        assert_eq!(effective_max_tokens(1_000_000, Some(5_000)), 5_000);
    }

    #[test]
    fn derives_from_context_window_when_no_override() {
        assert_eq!(effective_max_tokens(1_000_000, None), 700_000);
        assert_eq!(effective_max_tokens(100_000, None), 84_000);
    }
}
