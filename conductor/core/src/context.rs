//! Context Window Sizing
//!
//! Picks the generation context size for an outbound request before the
//! stream opens: large enough for the prompt plus a reply, never larger than
//! needed.

use crate::backend::OutboundMessage;

/// Rough characters-per-token estimate
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens reserved for the reply
pub const RESPONSE_HEADROOM: usize = 2000;

/// Smallest context window ever requested
pub const MIN_CONTEXT: u32 = 4096;

/// Largest context window ever requested
pub const MAX_CONTEXT: u32 = 32768;

/// Context size for a prompt of `total_chars` characters
///
/// `ceil(chars / 4) + 2000`, clamped to `[4096, 32768]`.
#[must_use]
pub fn context_size_for_chars(total_chars: usize) -> u32 {
    let estimated_tokens = total_chars.div_ceil(CHARS_PER_TOKEN);
    let wanted = estimated_tokens.saturating_add(RESPONSE_HEADROOM);
    let clamped = wanted.clamp(MIN_CONTEXT as usize, MAX_CONTEXT as usize);
    u32::try_from(clamped).unwrap_or(MAX_CONTEXT)
}

/// Context size for an outbound message list
#[must_use]
pub fn context_window_size(messages: &[OutboundMessage]) -> u32 {
    let total_chars = messages.iter().map(|m| m.content.chars().count()).sum();
    context_size_for_chars(total_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageRole;

    #[test]
    fn test_documented_bounds() {
        assert_eq!(context_size_for_chars(0), 4096);
        assert_eq!(context_size_for_chars(4000), 4096);
        assert_eq!(context_size_for_chars(1_000_000), 32768);
    }

    #[test]
    fn test_between_bounds() {
        // 40_000 chars -> 10_000 tokens + 2000 headroom
        assert_eq!(context_size_for_chars(40_000), 12_000);
        // ceil: 8_389 chars -> 2_098 tokens
        assert_eq!(context_size_for_chars(8_389), 4098);
    }

    #[test]
    fn test_monotonic_and_clamped() {
        let mut previous = 0;
        for chars in (0..200_000).step_by(997) {
            let size = context_size_for_chars(chars);
            assert!(size >= previous);
            assert!((MIN_CONTEXT..=MAX_CONTEXT).contains(&size));
            previous = size;
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let messages = vec![
            OutboundMessage::new(MessageRole::System, "é".repeat(20_000)),
            OutboundMessage::new(MessageRole::User, "a".repeat(20_000)),
        ];
        // 40_000 chars (60_000 bytes) -> 12_000
        assert_eq!(context_window_size(&messages), 12_000);
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(context_window_size(&[]), MIN_CONTEXT);
    }
}
