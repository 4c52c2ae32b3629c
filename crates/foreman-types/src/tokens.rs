//! Word-based token estimation.
//!
//! Used by the compactor and firewall to approximate how much context a
//! piece of text will occupy without calling a tokenizer.

/// Approximate tokens per word for English prose mixed with code.
const TOKENS_PER_WORD: f64 = 1.3;

/// Estimate the token count of a piece of text.
///
/// Rough approximation: whitespace-delimited word count times 1.3. Good
/// enough for budget gating; authoritative counts come from the provider's
/// usage records.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * TOKENS_PER_WORD).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   "), 0);
    }

    #[test]
    fn test_scales_with_words() {
        let ten = estimate_tokens("one two three four five six seven eight nine ten");
        assert_eq!(ten, 13);
    }

    #[test]
    fn test_ignores_extra_whitespace() {
        assert_eq!(estimate_tokens("a  b\n c"), estimate_tokens("a b c"));
    }
}
