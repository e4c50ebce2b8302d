//! Conversation titles derived from the first user message.

use tandem_protocol::{TITLE_MAX_CHARS, TITLE_MAX_WORDS};

const FALLBACK_TITLE: &str = "New conversation";

/// First few words of the message, truncated to the character budget with
/// an ellipsis when longer.
pub fn derive_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(TITLE_MAX_WORDS).collect();
    if words.is_empty() {
        return FALLBACK_TITLE.to_string();
    }

    let mut title = words.join(" ");
    if text.split_whitespace().count() > TITLE_MAX_WORDS {
        title.push('…');
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        title = title.chars().take(TITLE_MAX_CHARS - 1).collect();
        title = title.trim_end().to_string();
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_becomes_title_verbatim() {
        assert_eq!(derive_title("What is the weather in Oslo?"), "What is the weather in Oslo?");
    }

    #[test]
    fn long_message_truncates_to_word_and_char_budgets() {
        let message = "Please write me a very detailed and thorough explanation of how \
                       transformers work internally";
        let title = derive_title(message);
        assert!(title.chars().count() <= TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn word_budget_applies_before_char_budget() {
        let message = "a b c d e f g h i j k l";
        assert_eq!(derive_title(message), "a b c d e f g h i j…");
    }

    #[test]
    fn empty_message_gets_fallback() {
        assert_eq!(derive_title("   "), FALLBACK_TITLE);
    }

    #[test]
    fn unbroken_long_word_is_cut_at_char_budget() {
        let message = "x".repeat(120);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }
}
