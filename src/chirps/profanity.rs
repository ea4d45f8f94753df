use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    static ref BAD_WORDS: HashSet<&'static str> =
        ["kerfuffle", "sharbert", "fornax"].into_iter().collect();
}

const MASK: &str = "****";

/// Masks banned words. Words are whitespace-separated and matched without
/// regard to case; punctuation attached to a word keeps it unmasked.
pub fn filter_profanity(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            if BAD_WORDS.contains(word.to_lowercase().as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_bad_words_case_insensitively() {
        assert_eq!(
            filter_profanity("This is a kerfuffle opinion I need to share with the world"),
            "This is a **** opinion I need to share with the world"
        );
        assert_eq!(filter_profanity("Sharbert and FORNAX"), "**** and ****");
    }

    #[test]
    fn punctuation_protects_words() {
        assert_eq!(filter_profanity("Sharbert! is fine"), "Sharbert! is fine");
    }

    #[test]
    fn clean_text_passes_through() {
        assert_eq!(filter_profanity("I had something interesting for breakfast"), "I had something interesting for breakfast");
    }
}
